//! Database query functions for the `companies` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Company;

/// Parameters for inserting a new company row.
#[derive(Debug, Clone, Default)]
pub struct NewCompany<'a> {
    pub name: &'a str,
    pub has_intellectual_property: bool,
    pub intends_asset_sale: bool,
    pub has_received_offers: bool,
    pub has_financial_obligations: bool,
    pub has_employees: bool,
}

/// Insert a new company. Returns the inserted row with server-generated
/// defaults (id, created_at).
pub async fn insert_company(pool: &PgPool, new: &NewCompany<'_>) -> Result<Company> {
    let company = sqlx::query_as::<_, Company>(
        "INSERT INTO companies (name, has_intellectual_property, intends_asset_sale, \
         has_received_offers, has_financial_obligations, has_employees) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(new.name)
    .bind(new.has_intellectual_property)
    .bind(new.intends_asset_sale)
    .bind(new.has_received_offers)
    .bind(new.has_financial_obligations)
    .bind(new.has_employees)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert company {:?}", new.name))?;

    Ok(company)
}

/// Fetch a company by its ID.
pub async fn get_company(pool: &PgPool, id: Uuid) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch company")?;

    Ok(company)
}

/// List all companies, newest first.
pub async fn list_companies(pool: &PgPool) -> Result<Vec<Company>> {
    let companies =
        sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
            .context("failed to list companies")?;

    Ok(companies)
}
