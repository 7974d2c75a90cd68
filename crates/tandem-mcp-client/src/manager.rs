// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tandem_config::McpConfig;

use crate::adapter::McpToolAdapter;
use crate::client::{McpClient, McpClientError, StdioClient};

#[derive(Default)]
struct ManagerInner {
    clients: HashMap<String, Arc<dyn McpClient>>,
    /// Keyed by `<server>/<tool>` so tools from different servers never
    /// collide.
    tools: HashMap<String, Arc<McpToolAdapter>>,
}

/// Owns a set of named MCP clients and the flat namespaced tool map built
/// from their listings.
///
/// Failures are isolated per server: a server that fails to connect or
/// list contributes no tools and does not stop the others from loading.
#[derive(Default)]
pub struct McpManager {
    inner: Mutex<ManagerInner>,
}

impl McpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build, connect, and register a stdio client for every enabled
    /// server in `config`.
    pub async fn load_config(&self, config: &McpConfig) {
        for (name, server) in &config.mcp_servers {
            if server.disabled {
                debug!(server = %name, "skipping disabled mcp server");
                continue;
            }
            let client: Arc<dyn McpClient> =
                Arc::new(StdioClient::new(name.clone(), server.clone()));
            self.add_client(name.clone(), client).await;
        }
    }

    /// Connect a pre-constructed client and register its tools under
    /// `<name>/<tool>`.  On any failure the error is logged, none of this
    /// server's tools are registered, and the caller proceeds.
    pub async fn add_client(&self, name: String, client: Arc<dyn McpClient>) {
        if let Err(e) = client.connect().await {
            warn!(server = %name, error = %e, "mcp server failed to connect; skipping its tools");
            return;
        }
        let tools = match client.list_tools().await {
            Ok(t) => t,
            Err(e) => {
                warn!(server = %name, error = %e, "mcp tools/list failed; skipping its tools");
                let _ = client.close().await;
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        for info in tools {
            let key = format!("{name}/{}", info.name);
            let adapter = Arc::new(McpToolAdapter::new(Arc::clone(&client), info));
            inner.tools.insert(key, adapter);
        }
        inner.clients.insert(name.clone(), client);
        info!(server = %name, "mcp server ready");
    }

    /// All registered adapters, in no particular order.
    pub async fn get_tools(&self) -> Vec<Arc<McpToolAdapter>> {
        self.inner.lock().await.tools.values().cloned().collect()
    }

    /// Look up an adapter by its namespaced `<server>/<tool>` key.
    pub async fn get_tool(&self, key: &str) -> Option<Arc<McpToolAdapter>> {
        self.inner.lock().await.tools.get(key).cloned()
    }

    /// Names of the currently connected servers, sorted.
    pub async fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().await.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn tool_count(&self) -> usize {
        self.inner.lock().await.tools.len()
    }

    /// Close every client and clear both maps.  The maps are cleared even
    /// when individual closes fail; the last close error is returned.
    pub async fn shutdown(&self) -> Result<(), McpClientError> {
        let mut inner = self.inner.lock().await;
        let mut last_err = None;
        for (name, client) in inner.clients.drain() {
            if let Err(e) = client.close().await {
                warn!(server = %name, error = %e, "mcp server close failed");
                last_err = Some(e);
            }
        }
        inner.tools.clear();
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
