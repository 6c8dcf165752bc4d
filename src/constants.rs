// Raw order export columns the pipeline works with
pub const ORDER_ID: &str = "order_id";
pub const CUSTOMER_ID: &str = "customer_id";
pub const CREATED_AT: &str = "created_at";
pub const TOTAL_ORDER_VALUE: &str = "total_order_value";
pub const VISITOR_TYPE: &str = "visitor_type";

pub const WORKING_COLUMNS: [&str; 5] = [
    ORDER_ID,
    CUSTOMER_ID,
    CREATED_AT,
    TOTAL_ORDER_VALUE,
    VISITOR_TYPE,
];

// Aggregated series columns
pub const DATE: &str = "date";
pub const ORDER_COUNT: &str = "order_count";
pub const TOTAL_VALUE: &str = "total_value";
pub const IS_WEEKEND: &str = "is_weekend";

/// Substring (case-insensitive) marking a customer with an order history
pub const RETURNING_MARKER: &str = "returning";

// Model parameters
pub const DEFAULT_LOOKBACK: usize = 7;
pub const DEFAULT_HORIZON: usize = 1;
pub const DEFAULT_PREDICTIONS: usize = 7;
pub const DEFAULT_HIDDEN_UNITS: usize = 50;
pub const DEFAULT_EPOCHS: usize = 20;
pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_SEED: u64 = 42;

// Data preprocessing
pub const TRAIN_SPLIT_RATIO: f64 = 0.7; // 70% train, 30% held out

// Model paths
pub const DEFAULT_MODEL_DIR: &str = "models";
pub const DEFAULT_RESULTS_FILE: &str = "results.csv";
pub const MODEL_EXTENSION: &str = "bin";
pub const METADATA_EXTENSION: &str = "meta.json";
