pub mod deletion_queue;
