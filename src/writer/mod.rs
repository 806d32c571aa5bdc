pub mod batch;
pub mod batch_writer;
