pub mod database_writer;

pub use database_writer::{
    PersistenceWriter, PersistenceWriterBuilder, PersistenceWriterConfig, WriterSummary,
};
