//! Field catalogues for the company registry site.
//!
//! Label lists carry both the Serbian (`Mesto`) and Montenegrin (`Mjesto`)
//! spellings, since the site serves both template families.

use super::FieldSpec;

/// Registration block of a company detail page.
pub fn registration_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name_short", &["Naziv skraćeni", "Skraćeni naziv", "Naziv"]),
        FieldSpec::new("name_full", &["Naziv pun", "Puni naziv"]),
        FieldSpec::new("registration_number", &["Registarski broj", "Matični broj"]),
        FieldSpec::new("tax_number", &["PIB", "Poreski broj"]),
        FieldSpec::new("activity_code", &["Delatnost", "Djelatnost", "Šifra delatnosti"]),
        FieldSpec::new("activity_name", &["Opis delatnosti", "Opis djelatnosti"]),
        FieldSpec::new("legal_form", &["Pravni oblik", "Oblik organizovanja"]),
        FieldSpec::new("registry_status", &["Status", "CRPS Status"]),
        FieldSpec::new("founded_date", &["Datum osnivanja"]).date(),
        FieldSpec::new("country", &["Država", "Drzava"]),
        FieldSpec::new("region", &["Opština", "Opstina", "Region"]),
        FieldSpec::new("city", &["Mesto", "Mjesto", "Grad"]),
        FieldSpec::new("address", &["Adresa"]),
        FieldSpec::new("vat_number", &["PDV broj", "PDV Obveznik"]),
        FieldSpec::new("total_capital", &["Ukupni kapital", "Ukupno smanjenje kapitala"]).decimal(','),
        FieldSpec::new("paid_capital", &["Uplaćeni kapital", "Uplaćeno povećanje kapitala"]).decimal(','),
        FieldSpec::new("authorized_capital", &["Upisani kapital", "Upisano povećanje kapitala"]).decimal(','),
        FieldSpec::new("phone", &["Telefon", "Tel"]),
        FieldSpec::new("email", &["E-mail", "Email"]),
        FieldSpec::new("website", &["Web", "Web sajt", "Internet adresa"]),
    ]
}

/// Rows of the business results table, read from one year's column.
pub fn business_result_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("revenue", &["Poslovni prihodi", "Poslovni prihod"]).decimal(','),
        FieldSpec::new("net_profit", &["Neto rezultat"]).decimal(','),
        FieldSpec::new("total_assets", &["Ukupna aktiva"]).decimal(','),
        FieldSpec::new("employees", &["Broj zaposlenih"]).integer(),
        FieldSpec::new("return_on_equity", &["Stopa povrata na kapital (roe)", "ROE"]).percentage(),
        FieldSpec::new("return_on_assets", &["Stopa povrata aktive (roa)", "ROA"]).percentage(),
    ]
}

/// One element of the listing API's `Data` array.
pub fn listing_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("name_full", &["CompanyName", "Name", "FullName"]),
        FieldSpec::new("name_short", &["ShortName"]),
        FieldSpec::new("tax_number", &["TaxNumber", "VatNumber", "PIB"]),
        FieldSpec::new("registration_number", &["RegistrationNumber", "RegistryCode"]),
        FieldSpec::new("activity_code", &["ActivityCode"]),
        FieldSpec::new("activity_name", &["ActivityName"]),
        FieldSpec::new("city", &["Place", "City"]),
        FieldSpec::new("municipality", &["Municipality"]),
        FieldSpec::new("region", &["Region"]),
        FieldSpec::new("address", &["Address"]),
        FieldSpec::new("phone", &["Phone"]),
        FieldSpec::new("email", &["Email"]),
        FieldSpec::new("website", &["Website", "Web"]),
        FieldSpec::new("founded_date", &["FoundingDate"]).date(),
        FieldSpec::new("employees", &["NumberOfEmployees"]).integer(),
        FieldSpec::new("revenue", &["SalesIncome", "Revenue"]).decimal('.'),
        FieldSpec::new("net_profit", &["NetProfit"]).decimal('.'),
        FieldSpec::new("total_assets", &["TotalAssets"]).decimal('.'),
        FieldSpec::new("total_capital", &["Capital"]).decimal('.'),
        FieldSpec::new("legal_form", &["LegalForm"]),
        FieldSpec::new("registry_status", &["Status", "AprStatus"]),
    ]
}

/// Detail page URL for one company id.
pub fn detail_url(base_url: &str, id: u64) -> String {
    format!("{}/kompanija/{id}", base_url.trim_end_matches('/'))
}

/// Listing API URL for one page (1-based).
pub fn listing_url(base_url: &str, page: usize, page_size: usize) -> String {
    format!(
        "{}/advanced-search-company/CompanyFilteringRead?sort=Revenue-desc&page={page}&pageSize={page_size}&group=&filter=",
        base_url.trim_end_matches('/')
    )
}
