use std::fmt;
use std::io::Write;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown value `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! text_column_enum {
    ($ty:ty) => {
        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = std::str::from_utf8(bytes.as_bytes())?;
                Ok(raw.parse::<$ty>()?)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    OnWay,
    OnSite,
    PickedUp,
    Delivered,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::OnWay,
        JobStatus::OnSite,
        JobStatus::PickedUp,
        JobStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::OnWay => "on_way",
            JobStatus::OnSite => "on_site",
            JobStatus::PickedUp => "picked_up",
            JobStatus::Delivered => "delivered",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::OnWay | JobStatus::OnSite)
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

text_column_enum!(JobStatus);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    #[default]
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "employee" => Ok(Role::Employee),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

text_column_enum!(Role);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    #[default]
    Pending,
    Active,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileStatus::Pending => "pending",
            ProfileStatus::Active => "active",
        }
    }
}

impl FromStr for ProfileStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ProfileStatus::Pending),
            "active" => Ok(ProfileStatus::Active),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

text_column_enum!(ProfileStatus);

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub role: Role,
    pub status: ProfileStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_date: NaiveDate,
    pub lot_number: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub assets: Option<String>,
    pub comments: Option<String>,
    pub contact_name: Option<String>,
    pub contact_detail: Option<String>,
    pub status: JobStatus,
    pub last_updated_by: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_date: NaiveDate,
    pub lot_number: Option<String>,
    pub company_name: Option<String>,
    pub address: Option<String>,
    pub assets: Option<String>,
    pub comments: Option<String>,
    pub contact_name: Option<String>,
    pub contact_detail: Option<String>,
    pub status: JobStatus,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Associations, Serialize, Deserialize)]
#[diesel(table_name = job_assignments)]
#[diesel(belongs_to(Job))]
#[diesel(belongs_to(Profile, foreign_key = user_id))]
#[diesel(primary_key(job_id, user_id))]
pub struct Assignment {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_assignments)]
pub struct NewAssignment {
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = push_subscriptions)]
#[diesel(belongs_to(Profile, foreign_key = user_id))]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = push_subscriptions)]
pub struct NewPushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = dashboard_shares)]
pub struct DashboardShare {
    pub id: Uuid,
    pub name: String,
    pub token_hash: String,
    pub created_by: Option<Uuid>,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = dashboard_shares)]
pub struct NewDashboardShare {
    pub id: Uuid,
    pub name: String,
    pub token_hash: String,
    pub created_by: Option<Uuid>,
    pub expires_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = job_import_batches)]
pub struct ImportBatch {
    pub id: Uuid,
    pub source_type: String,
    pub raw_text: String,
    pub created_by: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = job_import_batches)]
pub struct NewImportBatch {
    pub id: Uuid,
    pub source_type: String,
    pub raw_text: String,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = job_import_rows)]
#[diesel(belongs_to(ImportBatch, foreign_key = batch_id))]
pub struct ImportRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub extracted: serde_json::Value,
    pub is_selected: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = job_import_rows)]
pub struct NewImportRow {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub extracted: serde_json::Value,
    pub is_selected: bool,
}
