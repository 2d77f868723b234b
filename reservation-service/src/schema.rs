diesel::table! {
    events (event_id) {
        event_id -> Uuid,
        name -> Varchar,
        capacity -> Int4,
        available_seats -> Int4,
        version -> Int8,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reservations (reservation_id) {
        reservation_id -> Uuid,
        event_id -> Uuid,
        user_id -> Uuid,
        partner_id -> Uuid,
        seats -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    events,
    reservations,
);
