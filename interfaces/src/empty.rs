use crate::defs::ErrorRecord;
use crate::defs::ErrorSink;

pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn record(&self, _record: ErrorRecord) {
        // Nothing is kept, so nothing can go wrong.
    }

    fn list(&self) -> Vec<ErrorRecord> {
        vec![]
    }
}
