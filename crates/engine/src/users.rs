//! Users table.
//!
//! A user row is the identity anchor for one chat sender. Rows are created
//! lazily on first inbound event and never deleted by the engine.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Opaque sender identifier on the messaging channel.
    #[sea_orm(unique)]
    pub sender_id: String,
    /// E.164-like phone number used for the SMS channel, when known.
    pub phone_number: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
