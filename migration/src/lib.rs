pub use sea_orm_migration::prelude::*;

mod m20260109_000001_create_campaign_tables;
mod m20260109_000002_create_spin_tables;
mod m20260109_000003_add_allowed_phones;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260109_000001_create_campaign_tables::Migration),
            Box::new(m20260109_000002_create_spin_tables::Migration),
            Box::new(m20260109_000003_add_allowed_phones::Migration),
        ]
    }
}
