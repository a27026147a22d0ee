pub mod counter_store;

pub use counter_store::{
    CounterStore, StoredRecord, InMemoryCounterStore,
    Clock, SystemClock, ManualClock,
};
