//! End-to-end extraction over authored JSON rules.

use invx_extract::{ExtractionRule, FieldExtractor, ReviewSummary};
use invx_model::{DocumentInput, ReviewType};

const RULES: &str = r#"[
    {
        "id": "inv-no",
        "fieldName": "invoice_number",
        "pattern": {
            "method": "regex",
            "pattern": "Invoice\\s+No\\.?\\s*:?\\s*([A-Z]+-\\d{4}-\\d+)",
            "flags": "i",
            "groupIndex": 1
        },
        "isRequired": true
    },
    {
        "id": "inv-date",
        "fieldName": "invoice_date",
        "pattern": {"method": "keyword", "keywords": ["Invoice Date"]}
    },
    {
        "id": "total",
        "fieldName": "total_amount",
        "pattern": {"method": "vendor_field", "name": "InvoiceTotal"}
    },
    {
        "id": "shipper",
        "fieldName": "shipper",
        "tier": "COMPANY_SPECIFIC",
        "pattern": {
            "method": "position",
            "region": {"top": 0.0, "left": 0.0, "width": 0.5, "height": 0.1},
            "confidenceBoost": 0.1
        }
    },
    {
        "id": "container",
        "fieldName": "container_no",
        "pattern": {"method": "regex", "pattern": "[A-Z]{4}\\d{7}"},
        "isRequired": true
    }
]"#;

const DOCUMENT: &str = r#"{
    "text": "ACME Logistics\nInvoice No: INV-2024-001\nInvoice Date: 18.12.2024 | Page 1\n",
    "vendorFields": {"InvoiceTotal": {"content": "USD 1,234.50"}},
    "pages": [
        {
            "page": 1,
            "lines": [
                {"text": "ACME Logistics", "boundingBox": {"x": 0.05, "y": 0.02, "width": 0.3, "height": 0.03}},
                {"text": "Invoice No: INV-2024-001", "boundingBox": {"x": 0.05, "y": 0.2, "width": 0.4, "height": 0.03}}
            ]
        }
    ]
}"#;

fn outcome() -> invx_extract::ExtractionOutcome {
    let rules: Vec<ExtractionRule> = serde_json::from_str(RULES).unwrap();
    let document: DocumentInput = serde_json::from_str(DOCUMENT).unwrap();
    FieldExtractor::new(rules).unwrap().extract(&document, None)
}

#[test]
fn extracts_scores_and_routes_fields() {
    let outcome = outcome();
    let mut lines: Vec<String> = outcome
        .fields
        .iter()
        .map(|f| {
            format!(
                "{}={} {} {:.2} {}",
                f.field_name, f.value, f.assessment.tier, f.assessment.score, f.assessment.review_type
            )
        })
        .collect();
    lines.extend(outcome.unmatched.iter().map(|u| {
        format!(
            "{} unmatched: {} required={}",
            u.field_name, u.reason, u.is_required
        )
    }));

    insta::assert_snapshot!(lines.join("\n"), @r"
    invoice_number=INV-2024-001 UNIVERSAL 80.75 QUICK_REVIEW
    invoice_date=2024-12-18 UNIVERSAL 71.25 QUICK_REVIEW
    total_amount=1234.50 VENDOR_DIRECT 90.00 AUTO_APPROVE
    shipper=ACME Logistics COMPANY_SPECIFIC 80.00 QUICK_REVIEW
    container_no unmatched: no_matching_rule required=true
    ");
}

#[test]
fn statistics_and_review_summary() {
    let outcome = outcome();
    let stats = &outcome.statistics;
    assert_eq!(stats.total_fields, 5);
    assert_eq!(stats.mapped_fields, 4);
    assert_eq!(stats.unmapped_fields, 1);
    assert_eq!(stats.rules_applied, 4);
    assert!((stats.average_score - 80.5).abs() < 0.01);

    let summary = ReviewSummary::from_outcome(&outcome);
    assert_eq!(summary.count(ReviewType::AutoApprove), 1);
    assert_eq!(summary.count(ReviewType::QuickReview), 3);
    assert_eq!(summary.count(ReviewType::FullReview), 0);
    assert_eq!(summary.missing_required, vec!["container_no".to_string()]);
}

#[test]
fn candidates_feed_mapping_stage() {
    let candidates = outcome().candidates();
    assert_eq!(candidates.len(), 4);
    let total = candidates
        .iter()
        .find(|c| c.field_name == "total_amount")
        .unwrap();
    assert_eq!(total.value.as_deref(), Some("1234.50"));
    assert!((total.raw_confidence - 0.90).abs() < 1e-9);
}
