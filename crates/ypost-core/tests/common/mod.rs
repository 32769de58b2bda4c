pub mod nntp_server;
