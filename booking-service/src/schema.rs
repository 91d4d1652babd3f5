diesel::table! {
    users (id) {
        id -> Int4,
        username -> Varchar,
        password_hash -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    seats (id) {
        id -> Int4,
        seat_number -> Varchar,
    }
}

diesel::table! {
    reservations (id) {
        id -> Int4,
        user_name -> Varchar,
        seat_number -> Varchar,
        reservation_date -> Date,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    refresh_tokens (token_hash) {
        token_hash -> Varchar,
        user_name -> Varchar,
        expires_at -> Timestamptz,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    seats,
    reservations,
    refresh_tokens,
);
