//! Prompt template for tender-response prefilling.
//!
//! The two tender PDFs travel as inline attachments; the prompt only
//! describes them and carries the company profile as plain text. Callers can
//! override the template via [`crate::config::PrefillConfig::prompt_template`];
//! the constant here is used only when no override is provided.

/// Placeholder replaced by the company information text.
pub const COMPANY_INFO_PLACEHOLDER: &str = "{company_info}";

/// Default instructions sent alongside the RFT and TRD attachments.
pub const DEFAULT_PREFILL_TEMPLATE: &str = r#"You are a document automation assistant. You are provided with three inputs:
1. A Request for Tender (RFT) document (Base64-encoded) containing details about the tender, including requirements, scope, and evaluation criteria.
2. A Tender Response Document (TRD) template (Base64-encoded) that needs to be filled based on the RFT and the company's information.
3. Company information in plain text, which includes general details about the company's expertise, certifications, solutions, and experience.

Your task is to:
- Extract relevant information from the RFT document.
- Use the company information to prefill fields in the TRD wherever applicable.
- For fields that require specific or detailed information (e.g., technical specifications), provide a general response based on common practices. For example:
  - **Data Residency:** Prefill with a generic statement like "Our solution ensures that all data is stored within the EU/EEA, meeting residency requirements."
  - **Data Protection Requirements:** Prefill with a statement like "Our solution complies with GDPR and ensures robust data security measures as outlined in the RFT."
  - **Project Architecture:** Prefill fields that require a project or solution architecture with a general solution based on your knowledge.
- Try to fill as many fields as possible. The information will be corrected afterwards; this is only meant to provide prefilled content.

Here is the company information provided:
{company_info}
"#;

/// Interpolate the company information into `template`.
///
/// Every placeholder occurrence is replaced verbatim. A template without a
/// placeholder gets the company information appended after a blank line.
pub fn build_prompt(template: &str, company_info: &str) -> String {
    if template.contains(COMPANY_INFO_PLACEHOLDER) {
        template.replace(COMPANY_INFO_PLACEHOLDER, company_info)
    } else {
        format!("{}\n\n{}", template.trim_end(), company_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_has_placeholder_once() {
        assert_eq!(
            DEFAULT_PREFILL_TEMPLATE
                .matches(COMPANY_INFO_PLACEHOLDER)
                .count(),
            1
        );
    }

    #[test]
    fn company_info_lands_at_the_end() {
        let prompt = build_prompt(DEFAULT_PREFILL_TEMPLATE, "Acme Ltd. ISO 27001 certified.");
        assert!(!prompt.contains(COMPANY_INFO_PLACEHOLDER));
        assert!(prompt.trim_end().ends_with("Acme Ltd. ISO 27001 certified."));
        assert!(prompt.starts_with("You are a document automation assistant."));
    }

    #[test]
    fn braces_in_company_info_are_kept_verbatim() {
        let prompt = build_prompt("Info: {company_info}", "uses {json} and {company_info}");
        assert_eq!(prompt, "Info: uses {json} and {company_info}");
    }

    #[test]
    fn template_without_placeholder_appends() {
        let prompt = build_prompt("Fill the TRD.\n", "Acme");
        assert_eq!(prompt, "Fill the TRD.\n\nAcme");
    }

    #[test]
    fn every_placeholder_is_replaced() {
        let prompt = build_prompt("{company_info} / {company_info}", "X");
        assert_eq!(prompt, "X / X");
    }
}
