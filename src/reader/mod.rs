pub mod index_reader;
