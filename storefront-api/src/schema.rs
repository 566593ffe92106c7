diesel::table! {
    admin_notifications (id) {
        id -> Uuid,
        kind -> Varchar,
        title -> Varchar,
        message -> Text,
        reference_id -> Nullable<Uuid>,
        is_read -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    affiliates (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        website -> Nullable<Varchar>,
        social_handle -> Nullable<Varchar>,
        audience_size -> Nullable<Int4>,
        message -> Nullable<Text>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    banners (id) {
        id -> Uuid,
        title -> Varchar,
        subtitle -> Nullable<Varchar>,
        image_url -> Varchar,
        link_url -> Nullable<Varchar>,
        position -> Int4,
        is_active -> Bool,
        starts_at -> Nullable<Timestamptz>,
        ends_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bulk_orders (id) {
        id -> Uuid,
        contact_name -> Varchar,
        company_name -> Nullable<Varchar>,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        product_details -> Text,
        quantity -> Int4,
        message -> Nullable<Text>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    order_items (id) {
        id -> Uuid,
        order_id -> Uuid,
        product_id -> Uuid,
        product_name -> Varchar,
        unit_price -> Numeric,
        quantity -> Int4,
        line_total -> Numeric,
        position -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    orders (id) {
        id -> Uuid,
        order_number -> Varchar,
        user_id -> Nullable<Uuid>,
        customer_name -> Varchar,
        customer_email -> Varchar,
        customer_phone -> Nullable<Varchar>,
        subtotal -> Numeric,
        discount -> Numeric,
        tax -> Numeric,
        shipping_fee -> Numeric,
        total -> Numeric,
        status -> Varchar,
        payment_status -> Varchar,
        payment_method -> Nullable<Varchar>,
        payment_reference -> Nullable<Varchar>,
        shipping_address -> Jsonb,
        is_pre_order -> Bool,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    outbox_events (id) {
        id -> Uuid,
        aggregate_id -> Uuid,
        event_type -> Varchar,
        event_data -> Jsonb,
        processed -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    products (id) {
        id -> Uuid,
        name -> Varchar,
        price -> Numeric,
        stock_quantity -> Int4,
        in_stock -> Bool,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    transactions (id) {
        id -> Uuid,
        order_id -> Nullable<Uuid>,
        reference -> Nullable<Varchar>,
        amount -> Numeric,
        provider -> Nullable<Varchar>,
        payment_method -> Nullable<Varchar>,
        status -> Varchar,
        provider_payload -> Nullable<Jsonb>,
        paid_at -> Nullable<Timestamptz>,
        refunded_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(order_items -> orders (order_id));
diesel::joinable!(order_items -> products (product_id));
diesel::joinable!(transactions -> orders (order_id));

diesel::allow_tables_to_appear_in_same_query!(
    admin_notifications,
    affiliates,
    banners,
    bulk_orders,
    order_items,
    orders,
    outbox_events,
    products,
    transactions,
);
