diesel::table! {
    processed_events (event_id) {
        event_id -> Uuid,
        event_type -> Varchar,
        emails_sent -> Int4,
        processed_at -> Timestamptz,
    }
}
