use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use tracing::info;
use crate::auth::{hash_password, verify_password};
use crate::error::ApiError;
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let password_hash = hash_password(password)?;
        let mut conn = self.pool.get().await?;

        let new_user = NewUser {
            username: username.to_string(),
            password_hash,
        };
        let result = diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(&mut conn)
            .await;

        let user = conflict_on_unique(result, "Username already taken")?;
        info!("Registered user {}", user.username);
        Ok(user)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .filter(users::username.eq(username))
            .first::<User>(&mut conn)
            .await
            .optional()?;

        let user = match user {
            Some(user) => user,
            None => {
                return Err(ApiError::Unauthorized(
                    "Invalid username or password".to_string(),
                ))
            }
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        Ok(user)
    }

    pub async fn get(&self, user_id: i32) -> Result<User, ApiError> {
        let mut conn = self.pool.get().await?;
        let user = users::table
            .filter(users::id.eq(user_id))
            .first::<User>(&mut conn)
            .await
            .optional()?;
        user.ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    pub async fn update(&self, user_id: i32, username: &str, password: &str) -> Result<(), ApiError> {
        // the password is re-hashed unconditionally
        let password_hash = hash_password(password)?;
        let mut conn = self.pool.get().await?;

        let result = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::username.eq(username),
                users::password_hash.eq(password_hash),
            ))
            .execute(&mut conn)
            .await;

        let updated = conflict_on_unique(result, "Username already taken")?;
        if updated == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn delete(&self, user_id: i32) -> Result<(), ApiError> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(users::table.filter(users::id.eq(user_id)))
            .execute(&mut conn)
            .await?;
        if deleted == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}

pub struct ReservationService {
    pool: DbPool,
}

impl ReservationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_name: &str,
        seat_number: &str,
        reservation_date: NaiveDate,
    ) -> Result<Reservation, ApiError> {
        let mut conn = self.pool.get().await?;

        let new_reservation = NewReservation {
            user_name: user_name.to_string(),
            seat_number: seat_number.to_string(),
            reservation_date,
        };
        let result = diesel::insert_into(reservations::table)
            .values(&new_reservation)
            .get_result::<Reservation>(&mut conn)
            .await;

        // the unique (seat_number, reservation_date) constraint closes the
        // double-booking race, including concurrent inserts
        let reservation = conflict_on_unique(
            result,
            "This seat is already reserved for the selected date.",
        )?;
        info!(
            "Reserved seat {} on {} for {}",
            reservation.seat_number, reservation.reservation_date, reservation.user_name
        );
        Ok(reservation)
    }

    pub async fn list(
        &self,
        user_name: Option<String>,
        seat_number: Option<String>,
        reservation_date: Option<NaiveDate>,
    ) -> Result<Vec<Reservation>, ApiError> {
        let mut conn = self.pool.get().await?;

        let mut query = reservations::table.into_boxed();
        if let Some(user_name) = user_name {
            query = query.filter(reservations::user_name.eq(user_name));
        }
        if let Some(seat_number) = seat_number {
            query = query.filter(reservations::seat_number.eq(seat_number));
        }
        if let Some(reservation_date) = reservation_date {
            query = query.filter(reservations::reservation_date.eq(reservation_date));
        }

        let rows = query.load::<Reservation>(&mut conn).await?;
        Ok(rows)
    }

    pub async fn check_availability(
        &self,
        seat_number: &str,
        reservation_date: NaiveDate,
    ) -> Result<bool, ApiError> {
        let mut conn = self.pool.get().await?;
        let existing = reservations::table
            .filter(reservations::seat_number.eq(seat_number))
            .filter(reservations::reservation_date.eq(reservation_date))
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;
        Ok(existing.is_none())
    }

    pub async fn get(&self, reservation_id: i32) -> Result<Reservation, ApiError> {
        let mut conn = self.pool.get().await?;
        let reservation = reservations::table
            .filter(reservations::id.eq(reservation_id))
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;
        reservation.ok_or_else(|| ApiError::NotFound("Reservation not found".to_string()))
    }

    pub async fn cancel(&self, reservation_id: i32, caller: &str) -> Result<(), ApiError> {
        let mut conn = self.pool.get().await?;
        let reservation = reservations::table
            .filter(reservations::id.eq(reservation_id))
            .first::<Reservation>(&mut conn)
            .await
            .optional()?;

        let reservation = match reservation {
            Some(reservation) => reservation,
            None => return Err(ApiError::NotFound("Reservation not found".to_string())),
        };

        if reservation.user_name != caller {
            return Err(ApiError::Forbidden(
                "You can only cancel your own reservations".to_string(),
            ));
        }

        diesel::delete(reservations::table.filter(reservations::id.eq(reservation_id)))
            .execute(&mut conn)
            .await?;
        info!("Cancelled reservation {} for {}", reservation_id, caller);
        Ok(())
    }

    pub async fn seats(&self) -> Result<Vec<Seat>, ApiError> {
        let mut conn = self.pool.get().await?;
        let rows = seats::table
            .order(seats::id.asc())
            .load::<Seat>(&mut conn)
            .await?;
        Ok(rows)
    }
}

fn conflict_on_unique<T>(result: QueryResult<T>, message: &str) -> Result<T, ApiError> {
    match result {
        Ok(value) => Ok(value),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Err(ApiError::Conflict(message.to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

pub fn parse_reservation_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ApiError::UnprocessableEntity("Invalid date format. Use YYYY-MM-DD".to_string())
    })
}

pub fn resolve_owner(
    identity: Option<String>,
    body_user_name: Option<String>,
) -> Result<String, ApiError> {
    // a bearer identity always wins; the body field is only trusted for
    // API-key (server-to-server) callers
    match identity {
        Some(user_name) => Ok(user_name),
        None => body_user_name
            .filter(|user_name| !user_name.is_empty())
            .ok_or_else(|| ApiError::UnprocessableEntity("user_name is required".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_reservation_date("2025-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn rejects_malformed_dates() {
        for raw in ["01-03-2025", "2025/03/01", "not-a-date", ""] {
            let err = parse_reservation_date(raw).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn owner_comes_from_the_authenticated_identity_when_present() {
        let owner = resolve_owner(Some("alice".to_string()), Some("mallory".to_string())).unwrap();
        assert_eq!(owner, "alice");

        let owner = resolve_owner(Some("alice".to_string()), None).unwrap();
        assert_eq!(owner, "alice");
    }

    #[test]
    fn api_key_callers_must_name_the_owner() {
        let owner = resolve_owner(None, Some("bob".to_string())).unwrap();
        assert_eq!(owner, "bob");

        let err = resolve_owner(None, None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = resolve_owner(None, Some(String::new())).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    fn unique_violation() -> DieselError {
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new(String::from(
                "duplicate key value violates unique constraint",
            )),
        )
    }

    #[test]
    fn duplicate_username_maps_to_conflict() {
        let result: QueryResult<()> = Err(unique_violation());
        let err = conflict_on_unique(result, "Username already taken").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Username already taken");
    }

    #[test]
    fn double_booking_maps_to_conflict() {
        let result: QueryResult<()> = Err(unique_violation());
        let err =
            conflict_on_unique(result, "This seat is already reserved for the selected date.")
                .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "This seat is already reserved for the selected date."
        );
    }

    #[test]
    fn other_database_errors_are_not_conflicts() {
        let result: QueryResult<()> = Err(DieselError::NotFound);
        let err = conflict_on_unique(result, "Username already taken").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let passthrough: QueryResult<i32> = Ok(7);
        assert_eq!(
            conflict_on_unique(passthrough, "Username already taken").unwrap(),
            7
        );
    }
}
