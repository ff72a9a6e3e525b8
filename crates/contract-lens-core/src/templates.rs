//! Per-document-type reference material: clauses a reader should expect,
//! warning signs, and the questions worth asking before signing.

use serde::{Deserialize, Serialize};

use crate::{analysis::DocumentType, risk::RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTemplate {
    pub id: DocumentType,
    pub name: &'static str,
    pub description: &'static str,
    pub common_clauses: &'static [&'static str],
    pub red_flags: &'static [&'static str],
    pub key_questions: &'static [&'static str],
}

static TEMPLATES: [DocumentTemplate; 6] = [
    DocumentTemplate {
        id: DocumentType::RentalAgreement,
        name: "Rental Agreement",
        description: "Standard residential lease agreement",
        common_clauses: &[
            "Security deposit terms",
            "Rent amount and due date",
            "Lease term and renewal",
            "Maintenance responsibilities",
            "Pet policy",
            "Utilities and services",
            "Late fees and penalties",
            "Termination conditions",
        ],
        red_flags: &[
            "Excessive security deposit",
            "Automatic renewal clauses",
            "Unlimited late fees",
            "Restrictive pet policies",
            "Unclear maintenance responsibilities",
        ],
        key_questions: &[
            "What is the security deposit amount and when is it returned?",
            "When is rent due and what are the late fees?",
            "Who is responsible for maintenance and repairs?",
            "Are pets allowed and what are the restrictions?",
            "What happens if I need to break the lease early?",
        ],
    },
    DocumentTemplate {
        id: DocumentType::LoanContract,
        name: "Loan Contract",
        description: "Personal or business loan agreement",
        common_clauses: &[
            "Principal amount and interest rate",
            "Payment schedule and terms",
            "Late fees and default rates",
            "Collateral requirements",
            "Prepayment penalties",
            "Default and acceleration clauses",
            "Collection costs and attorney fees",
            "Governing law and jurisdiction",
        ],
        red_flags: &[
            "Excessive interest rates",
            "Balloon payments",
            "Prepayment penalties",
            "Personal guarantees",
            "Acceleration clauses",
            "Confession of judgment",
        ],
        key_questions: &[
            "What is the total amount I will pay over the life of the loan?",
            "What happens if I miss a payment?",
            "Can I pay off the loan early without penalty?",
            "What collateral is required?",
            "What are the consequences of default?",
        ],
    },
    DocumentTemplate {
        id: DocumentType::TermsOfService,
        name: "Terms of Service",
        description: "Website or app terms of service",
        common_clauses: &[
            "User obligations and restrictions",
            "Intellectual property rights",
            "Privacy and data collection",
            "Liability limitations",
            "Dispute resolution",
            "Termination rights",
            "Content policies",
            "Service availability",
        ],
        red_flags: &[
            "Binding arbitration clauses",
            "Class action waivers",
            "Excessive liability limitations",
            "Unlimited data collection",
            "One-sided termination rights",
        ],
        key_questions: &[
            "How is my personal data collected and used?",
            "What are my rights if the service is terminated?",
            "How are disputes resolved?",
            "What content is prohibited?",
            "What happens to my data if I delete my account?",
        ],
    },
    DocumentTemplate {
        id: DocumentType::EmploymentContract,
        name: "Employment Contract",
        description: "Job offer or employment agreement",
        common_clauses: &[
            "Job title and responsibilities",
            "Salary and benefits",
            "Work schedule and location",
            "Non-compete agreements",
            "Confidentiality obligations",
            "Termination conditions",
            "Intellectual property rights",
            "Dispute resolution",
        ],
        red_flags: &[
            "Overly broad non-compete clauses",
            "Unlimited confidentiality obligations",
            "At-will termination without cause",
            "Assignment of all intellectual property",
            "Mandatory arbitration",
        ],
        key_questions: &[
            "What are my specific job responsibilities?",
            "What benefits am I entitled to?",
            "What restrictions apply after I leave?",
            "How can my employment be terminated?",
            "Who owns work I create during employment?",
        ],
    },
    DocumentTemplate {
        id: DocumentType::PurchaseAgreement,
        name: "Purchase Agreement",
        description: "Real estate or goods purchase contract",
        common_clauses: &[
            "Purchase price and payment terms",
            "Property or goods description",
            "Closing date and conditions",
            "Inspection and due diligence",
            "Title and ownership transfer",
            "Warranties and representations",
            "Default and remedies",
            "Closing costs and fees",
        ],
        red_flags: &[
            "Unclear property description",
            "Excessive closing costs",
            "Limited inspection rights",
            "One-sided default remedies",
            "Unclear title transfer process",
        ],
        key_questions: &[
            "What exactly am I purchasing?",
            "What are all the costs involved?",
            "What happens if the inspection reveals problems?",
            "When will I receive clear title?",
            "What are my rights if the seller defaults?",
        ],
    },
    DocumentTemplate {
        id: DocumentType::GeneralContract,
        name: "General Contract",
        description: "Agreement without a more specific template",
        common_clauses: &[
            "Parties and definitions",
            "Payment terms",
            "Term and termination",
            "Liability and indemnification",
            "Confidentiality obligations",
            "Dispute resolution",
            "Governing law",
            "Amendments and notices",
        ],
        red_flags: &[
            "One-sided termination rights",
            "Unlimited liability",
            "Automatic renewal clauses",
            "Binding arbitration clauses",
            "Vague payment obligations",
        ],
        key_questions: &[
            "What am I obliged to do, and by when?",
            "How much will this cost me in total?",
            "How can either party end the agreement?",
            "Who is liable if something goes wrong?",
            "How are disagreements resolved?",
        ],
    },
];

/// Template for `document_type`; the general template backs any type without
/// its own entry.
pub fn template_for(document_type: DocumentType) -> &'static DocumentTemplate {
    TEMPLATES
        .iter()
        .find(|template| template.id == document_type)
        .unwrap_or(&TEMPLATES[TEMPLATES.len() - 1])
}

pub fn all() -> &'static [DocumentTemplate] {
    &TEMPLATES
}

/// Type-specific advice, escalated when the overall risk is high.
pub fn recommendations_for(document_type: DocumentType, overall: RiskLevel) -> Vec<String> {
    let template = template_for(document_type);
    let mut recommendations = vec![format!(
        "Review all {} clauses carefully",
        template.name.to_lowercase()
    )];

    if overall == RiskLevel::High {
        recommendations
            .push("Consider consulting with a legal professional due to high-risk clauses".into());
    }

    let specific: &[&str] = match document_type {
        DocumentType::RentalAgreement => &[
            "Take photos of the property condition before moving in",
            "Understand your rights regarding security deposit return",
        ],
        DocumentType::LoanContract => &[
            "Calculate the total cost of the loan including all fees",
            "Understand the consequences of late payments",
        ],
        DocumentType::TermsOfService => &[
            "Review the privacy policy and data collection practices",
            "Understand how to terminate your account",
        ],
        DocumentType::EmploymentContract => &[
            "Negotiate any restrictive clauses before signing",
            "Understand your intellectual property rights",
        ],
        DocumentType::PurchaseAgreement => &[
            "Conduct thorough due diligence before closing",
            "Understand all closing costs and fees",
        ],
        DocumentType::GeneralContract => &[],
    };
    recommendations.extend(specific.iter().map(|s| s.to_string()));
    recommendations
}

/// Which of a template's common clauses a document appears to cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    /// Share of common clauses present, 0 to 100.
    pub percent: f64,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    pub recommendation: String,
}

/// A clause counts as present when its first word occurs in `text`
/// (case-insensitive).
pub fn completeness(document_type: DocumentType, text: &str) -> Completeness {
    let template = template_for(document_type);
    let lowered = text.to_lowercase();
    let (present, missing): (Vec<&'static str>, Vec<&'static str>) =
        template.common_clauses.iter().copied().partition(|clause| {
            clause
                .split_whitespace()
                .next()
                .map(|word| lowered.contains(&word.to_lowercase()))
                .unwrap_or(false)
        });

    let total = template.common_clauses.len();
    let percent = if total == 0 {
        100.0
    } else {
        present.len() as f64 * 100.0 / total as f64
    };
    let recommendation = if missing.is_empty() {
        "Document appears to contain standard clauses"
    } else {
        "Document may be missing important clauses"
    };

    Completeness {
        percent,
        present: present.into_iter().map(str::to_string).collect(),
        missing: missing.into_iter().map(str::to_string).collect(),
        recommendation: recommendation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_template() {
        for ty in DocumentType::ALL {
            let template = template_for(ty);
            assert_eq!(template.id, ty);
            assert!(!template.common_clauses.is_empty());
            assert!(!template.key_questions.is_empty());
        }
        assert_eq!(all().len(), DocumentType::ALL.len());
    }

    #[test]
    fn high_risk_adds_professional_advice() {
        let low = recommendations_for(DocumentType::LoanContract, RiskLevel::Low);
        let high = recommendations_for(DocumentType::LoanContract, RiskLevel::High);
        assert_eq!(low[0], "Review all loan contract clauses carefully");
        assert_eq!(high.len(), low.len() + 1);
        assert!(high[1].contains("legal professional"));
    }

    #[test]
    fn general_contract_has_only_generic_advice() {
        let recs = recommendations_for(DocumentType::GeneralContract, RiskLevel::Medium);
        assert_eq!(recs, vec!["Review all general contract clauses carefully".to_string()]);
    }

    #[test]
    fn completeness_matches_first_words() {
        let text = "The security deposit is $500. Rent is due monthly. Pets are not allowed.";
        let report = completeness(DocumentType::RentalAgreement, text);
        assert_eq!(
            report.present,
            vec!["Security deposit terms", "Rent amount and due date", "Pet policy"]
        );
        assert_eq!(report.missing.len(), 5);
        assert!((report.percent - 37.5).abs() < f64::EPSILON);
        assert_eq!(report.recommendation, "Document may be missing important clauses");
    }

    #[test]
    fn template_serializes_with_kebab_id() {
        let value = serde_json::to_value(template_for(DocumentType::TermsOfService)).unwrap();
        assert_eq!(value["id"], "terms-of-service");
        assert!(value["commonClauses"].is_array());
        assert!(value["keyQuestions"].is_array());
    }
}
