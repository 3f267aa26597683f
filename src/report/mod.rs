pub mod table;
pub mod writer;

pub use table::{ReportRow, ReportTable};
pub use writer::{ReportWriter, TEST_BEST_FILE, TEST_LATEST_FILE, TRAIN_FILE, VAL_FILE};
