//! CLI handlers for `dissolve company` subcommands.
//!
//! Implements:
//! - `dissolve company create <name> [--fact flags]` -- record a company
//! - `dissolve company list`                         -- list all companies
//! - `dissolve company show <company-id>`            -- facts and plan status

use anyhow::Result;
use sqlx::PgPool;

use dissolve_db::models::{Company, TaskCategory};
use dissolve_db::queries::companies::{self, NewCompany};
use dissolve_db::queries::tasks;

use crate::{CompanyCommands, parse_id};

/// Dispatch a `CompanyCommands` variant to the appropriate handler.
pub async fn run_company_command(command: CompanyCommands, pool: &PgPool) -> Result<()> {
    match command {
        CompanyCommands::Create {
            name,
            intellectual_property,
            asset_sale,
            received_offers,
            financial_obligations,
            employees,
        } => {
            let new = NewCompany {
                name: &name,
                has_intellectual_property: intellectual_property,
                intends_asset_sale: asset_sale,
                has_received_offers: received_offers,
                has_financial_obligations: financial_obligations,
                has_employees: employees,
            };
            cmd_create(pool, &new).await
        }
        CompanyCommands::List => cmd_list(pool).await,
        CompanyCommands::Show { company_id } => cmd_show(pool, &company_id).await,
    }
}

async fn cmd_create(pool: &PgPool, new: &NewCompany<'_>) -> Result<()> {
    let company = companies::insert_company(pool, new).await?;

    println!("Company created.");
    println!();
    print_company(&company);
    println!();
    println!("Next: run `dissolve compile {}` to build its plan.", company.id);
    Ok(())
}

async fn cmd_list(pool: &PgPool) -> Result<()> {
    let all = companies::list_companies(pool).await?;

    if all.is_empty() {
        println!("No companies found. Use `dissolve company create <name>` to add one.");
        return Ok(());
    }

    let id_w = 36;
    let name_w = all.iter().map(|c| c.name.len()).max().unwrap_or(4).max(4);

    println!("{:<id_w$}  {:<name_w$}  FACTS", "ID", "NAME");
    for company in &all {
        println!(
            "{:<id_w$}  {:<name_w$}  {}",
            company.id,
            company.name,
            fact_labels(company).join(","),
        );
    }

    Ok(())
}

async fn cmd_show(pool: &PgPool, raw_id: &str) -> Result<()> {
    let id = parse_id("company", raw_id)?;
    let company = companies::get_company(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("company {id} not found"))?;

    print_company(&company);

    let compiled = tasks::has_tasks_for_category(pool, id, TaskCategory::Dissolution).await?;
    println!(
        "  Plan:                  {}",
        if compiled { "compiled" } else { "not compiled" }
    );
    Ok(())
}

fn print_company(company: &Company) {
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("  Company ID:            {}", company.id);
    println!("  Name:                  {}", company.name);
    println!(
        "  Intellectual property: {}",
        yes_no(company.has_intellectual_property)
    );
    println!("  Intends asset sale:    {}", yes_no(company.intends_asset_sale));
    println!("  Received offers:       {}", yes_no(company.has_received_offers));
    println!(
        "  Financial obligations: {}",
        yes_no(company.has_financial_obligations)
    );
    println!("  Employees:             {}", yes_no(company.has_employees));
}

/// Short labels for the facts that are set.
fn fact_labels(company: &Company) -> Vec<&'static str> {
    let facts = [
        (company.has_intellectual_property, "ip"),
        (company.intends_asset_sale, "asset-sale"),
        (company.has_received_offers, "offers"),
        (company.has_financial_obligations, "obligations"),
        (company.has_employees, "employees"),
    ];
    let labels: Vec<&'static str> = facts
        .iter()
        .filter(|(set, _)| *set)
        .map(|(_, label)| *label)
        .collect();
    if labels.is_empty() { vec!["-"] } else { labels }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn company() -> Company {
        Company {
            id: Uuid::nil(),
            name: "Acme".to_string(),
            has_intellectual_property: false,
            intends_asset_sale: false,
            has_received_offers: false,
            has_financial_obligations: false,
            has_employees: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn fact_labels_lists_set_facts() {
        let mut c = company();
        assert_eq!(fact_labels(&c), vec!["-"]);

        c.has_intellectual_property = true;
        c.has_employees = true;
        assert_eq!(fact_labels(&c), vec!["ip", "employees"]);
    }
}
