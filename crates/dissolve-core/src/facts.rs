//! Company facts consulted for conditional step inclusion.

use serde::{Deserialize, Serialize};

use dissolve_db::models::Company;

/// Read-only snapshot of the company attributes the compiler consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFacts {
    pub has_intellectual_property: bool,
    pub intends_asset_sale: bool,
    pub has_received_offers: bool,
    pub has_financial_obligations: bool,
    pub has_employees: bool,
}

impl From<&Company> for CompanyFacts {
    fn from(company: &Company) -> Self {
        Self {
            has_intellectual_property: company.has_intellectual_property,
            intends_asset_sale: company.intends_asset_sale,
            has_received_offers: company.has_received_offers,
            has_financial_obligations: company.has_financial_obligations,
            has_employees: company.has_employees,
        }
    }
}
