pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_chain_tables;
mod m20260301_000002_create_event_tables;
mod m20260401_000003_create_message_relevant_data;
mod m20260401_000004_add_denom_metadata;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_chain_tables::Migration),
            Box::new(m20260301_000002_create_event_tables::Migration),
            Box::new(m20260401_000003_create_message_relevant_data::Migration),
            Box::new(m20260401_000004_add_denom_metadata::Migration),
        ]
    }
}
