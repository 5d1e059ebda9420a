pub const CREATE_FEEDS: &str = r#"
CREATE TABLE IF NOT EXISTS gtfs_feeds (
    id BIGSERIAL PRIMARY KEY,
    company_name TEXT NOT NULL UNIQUE,
    timezone TEXT NOT NULL,
    vehicle_position_url TEXT,
    trip_update_url TEXT,
    service_alert_url TEXT
);
"#;

pub const CREATE_VEHICLES: &str = r#"
CREATE TABLE IF NOT EXISTS gtfs_vehicles (
    id BIGSERIAL PRIMARY KEY,
    feed_id BIGINT NOT NULL REFERENCES gtfs_feeds (id),
    vehicle_gtfs_id BIGINT NOT NULL,
    UNIQUE (feed_id, vehicle_gtfs_id)
);
"#;

pub const CREATE_VEHICLE_POSITIONS: &str = r#"
CREATE TABLE IF NOT EXISTS vehicle_positions (
    id BIGSERIAL PRIMARY KEY,
    vehicle_id BIGINT NOT NULL REFERENCES gtfs_vehicles (id),
    lat DOUBLE PRECISION NOT NULL,
    lon DOUBLE PRECISION NOT NULL,
    occupancy_status SMALLINT,
    timestamp TIMESTAMP NOT NULL,
    time_recorded TIMESTAMP NOT NULL,
    day DATE NOT NULL
);
"#;

pub const CREATE_TRIP_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS trip_records (
    id BIGSERIAL PRIMARY KEY,
    vehicle_id BIGINT REFERENCES gtfs_vehicles (id),
    trip_id TEXT NOT NULL,
    timestamp TIMESTAMP NOT NULL,
    time_recorded TIMESTAMP NOT NULL,
    day DATE NOT NULL
);
"#;

pub const CREATE_STOP_DISTANCES: &str = r#"
CREATE TABLE IF NOT EXISTS stop_distances (
    id BIGSERIAL PRIMARY KEY,
    trip_record_id BIGINT NOT NULL REFERENCES trip_records (id),
    stop_id TEXT NOT NULL,
    time_till_arrive BIGINT NOT NULL
);
"#;

/// Idempotent DDL, executed in order at startup.
pub const SCHEMA: &[&str] = &[
    CREATE_FEEDS,
    CREATE_VEHICLES,
    CREATE_VEHICLE_POSITIONS,
    CREATE_TRIP_RECORDS,
    CREATE_STOP_DISTANCES,
    "CREATE INDEX IF NOT EXISTS idx_vehicle_positions_timestamp ON vehicle_positions (timestamp);",
    "CREATE INDEX IF NOT EXISTS idx_vehicle_positions_time_recorded ON vehicle_positions (time_recorded);",
    "CREATE INDEX IF NOT EXISTS idx_vehicle_positions_day ON vehicle_positions (day);",
    "CREATE INDEX IF NOT EXISTS idx_trip_records_timestamp ON trip_records (timestamp);",
    "CREATE INDEX IF NOT EXISTS idx_trip_records_time_recorded ON trip_records (time_recorded);",
    "CREATE INDEX IF NOT EXISTS idx_trip_records_day ON trip_records (day);",
];

pub const SELECT_FEEDS: &str = r#"
SELECT id, company_name, timezone, vehicle_position_url, trip_update_url, service_alert_url
FROM gtfs_feeds
ORDER BY id;
"#;

pub const SELECT_FEED_VEHICLES: &str = r#"
SELECT id, feed_id, vehicle_gtfs_id FROM gtfs_vehicles WHERE feed_id = $1;
"#;

pub const INSERT_VEHICLE: &str = r#"
INSERT INTO gtfs_vehicles (feed_id, vehicle_gtfs_id)
VALUES ($1, $2)
ON CONFLICT (feed_id, vehicle_gtfs_id) DO NOTHING
RETURNING id;
"#;

pub const SELECT_VEHICLE_ID: &str = r#"
SELECT id FROM gtfs_vehicles WHERE feed_id = $1 AND vehicle_gtfs_id = $2;
"#;

pub const INSERT_VEHICLE_POSITION: &str = r#"
INSERT INTO vehicle_positions (vehicle_id, lat, lon, occupancy_status, timestamp, time_recorded, day)
VALUES ($1, $2, $3, $4, $5, $6, $7);
"#;

pub const SELECT_CANCELED_TRIP_IDS: &str = r#"
SELECT trip_id FROM trip_records WHERE vehicle_id IS NULL AND day = $1;
"#;

pub const INSERT_TRIP_RECORD: &str = r#"
INSERT INTO trip_records (vehicle_id, trip_id, timestamp, time_recorded, day)
VALUES ($1, $2, $3, $4, $5)
RETURNING id;
"#;

pub const INSERT_STOP_DISTANCE: &str = r#"
INSERT INTO stop_distances (trip_record_id, stop_id, time_till_arrive)
VALUES ($1, $2, $3);
"#;
