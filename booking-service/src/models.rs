use diesel::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::seats)]
pub struct Seat {
    pub id: i32,
    pub seat_number: String,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: i32,
    pub user_name: String,
    pub seat_number: String,
    pub reservation_date: NaiveDate,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub user_name: String,
    pub seat_number: String,
    pub reservation_date: NaiveDate,
}

#[derive(Debug, Clone, Queryable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct RefreshToken {
    pub token_hash: String,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::refresh_tokens)]
pub struct NewRefreshToken {
    pub token_hash: String,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
}
