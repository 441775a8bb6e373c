mod mem_data_store;


pub use mem_data_store::*;
