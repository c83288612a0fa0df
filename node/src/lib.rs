// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod telemetry;
pub mod api;
pub mod server;
pub mod network;
pub mod wal_buffer;
pub mod wal_writer;
pub mod wal_reader;
pub mod recovery;
pub mod persistence;
pub mod namesystem;
pub mod edit_fetch;
pub mod registry;
pub mod image_transfer;
pub mod namenode;
pub mod replication;
pub mod datanode;
