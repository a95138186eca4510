pub mod batcher;
