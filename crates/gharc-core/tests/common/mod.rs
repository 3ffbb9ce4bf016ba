pub mod github_server;
