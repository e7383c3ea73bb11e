//! Table creation from entity definitions.
//!
//! Used by the test harness and by `auto_schema` startup mode. Production
//! deployments manage the schema out of band.

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Schema};

use crate::entities;

pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::ProductVariant),
        schema.create_table_from_entity(entities::CartLine),
        schema.create_table_from_entity(entities::Coupon),
        schema.create_table_from_entity(entities::ShippingConfig),
        schema.create_table_from_entity(entities::CustomerAddress),
        schema.create_table_from_entity(entities::OrderGroup),
        schema.create_table_from_entity(entities::PaymentTransaction),
        schema.create_table_from_entity(entities::Order),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(&*statement).await?;
    }
    Ok(())
}
