//! End-to-end pricing scenarios for the catalog sold on warmeleads.nl.

use warmeleads_api::models::LeadType;
use warmeleads_api::pricing::PricingCatalog;
use warmeleads_api::vat::calculate_vat;

#[test]
fn exclusive_thuisbatterijen_50_leads() {
    let quote = PricingCatalog::default_nl()
        .calculate_order("Thuisbatterijen", LeadType::Exclusive, 50)
        .unwrap();

    assert_eq!(quote.price_per_lead, 4000);
    assert_eq!(quote.billable_quantity, 50);
    assert_eq!(quote.total_amount, 200_000);
    assert_eq!(quote.vat_amount, 42_000);
    assert_eq!(quote.total_amount_incl_vat, 242_000);
    assert_eq!(quote.vat_percentage, 21);
    assert_eq!(quote.currency, "EUR");
}

#[test]
fn shared_thuisbatterijen_quantity_ignored() {
    let quote = PricingCatalog::default_nl()
        .calculate_order("Thuisbatterijen", LeadType::Shared, 1)
        .unwrap();

    assert_eq!(quote.price_per_lead, 1250);
    assert_eq!(quote.billable_quantity, 500);
    assert_eq!(quote.total_amount, 625_000);
    assert_eq!(quote.vat_amount, 131_250);
    assert_eq!(quote.total_amount_incl_vat, 756_250);
}

#[test]
fn price_per_lead_across_tier_boundaries() {
    let catalog = PricingCatalog::default_nl();
    let expectations = [
        (30, 4250),
        (49, 4250),
        (50, 4000),
        (74, 4000),
        (75, 3750),
        (1000, 3750),
    ];
    for (quantity, price) in expectations {
        let quote = catalog
            .calculate_order("Thuisbatterijen", LeadType::Exclusive, quantity)
            .unwrap();
        assert_eq!(quote.price_per_lead, price, "quantity {}", quantity);
        assert_eq!(quote.total_amount, price * i64::from(quantity));
    }
}

#[test]
fn unknown_package_is_never_silently_priced() {
    let catalog = PricingCatalog::default_nl();
    let err = catalog
        .calculate_order("NonexistentIndustry", LeadType::Exclusive, 10)
        .unwrap_err();
    assert_eq!(err.kind(), "package_not_found");

    // A known industry with no shared variant would fail the same way;
    // every default industry has both, so check the exclusive/shared split
    // resolves to distinct packages instead.
    let exclusive = catalog
        .calculate_order("Zonnepanelen", LeadType::Exclusive, 75)
        .unwrap();
    let shared = catalog
        .calculate_order("Zonnepanelen", LeadType::Shared, 75)
        .unwrap();
    assert_ne!(exclusive.package_id, shared.package_id);
}

#[test]
fn quote_totals_match_vat_calculator() {
    let quote = PricingCatalog::default_nl()
        .calculate_order("Warmtepompen", LeadType::Exclusive, 33)
        .unwrap();
    let vat = calculate_vat(quote.total_amount);
    assert_eq!(quote.vat_amount, vat.vat_amount);
    assert_eq!(quote.total_amount_incl_vat, vat.amount_incl_vat);
}
