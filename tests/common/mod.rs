#![allow(dead_code)]

use std::{net::SocketAddr, path::Path, sync::Arc};

use rustycontract::{
    config::{raw::RawResource, resource::Resource},
    http::{
        router::{RouteTable, SharedRoutes},
        server::{MockServer, ShutdownHandle},
    },
};
use serde_json::Value;

pub fn resource(record: Value) -> Arc<Resource> {
    let raw: RawResource = serde_json::from_value(record).expect("valid raw resource");
    Arc::new(Resource::from_raw(raw, Path::new(".")).expect("valid resource"))
}

pub struct RunningServer {
    pub addr: SocketAddr,
    pub routes: SharedRoutes,
    pub shutdown: ShutdownHandle,
    pub task: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

pub async fn start(resources: &[Arc<Resource>]) -> RunningServer {
    let routes = SharedRoutes::new(RouteTable::build(resources, "http://127.0.0.1:0"));
    let server = MockServer::bind("127.0.0.1:0", routes.clone())
        .await
        .expect("bind ephemeral port");
    let addr = server.local_addr().expect("local addr");
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(server.run());
    RunningServer {
        addr,
        routes,
        shutdown,
        task,
    }
}
