//! Direct checks of cluster state.
//!
//! kuttl assertions cover most needs. This is for test code that wants to
//! inspect the cluster itself between two harness runs.

use std::fmt::Debug;

use k8s_openapi::{api::core::v1::ConfigMap, NamespaceResourceScope};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

/// Read-only view of a cluster.
#[derive(Clone)]
pub struct ClusterProbe {
	client: Client,
}

impl std::fmt::Debug for ClusterProbe {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterProbe")
			.field("default_namespace", &self.client.default_namespace())
			.finish_non_exhaustive()
	}
}

impl ClusterProbe {
	/// Connect using the local kubeconfig, or the in-cluster config when running in a pod.
	pub async fn connect() -> Result<Self, kube::Error> {
		Ok(Self::new(Client::try_default().await?))
	}

	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Whether a namespaced object of type `K` named `name` exists in `namespace`.
	#[instrument(skip(self))]
	pub async fn exists<K>(&self, namespace: &str, name: &str) -> Result<bool, kube::Error>
	where
		K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
		K::DynamicType: Default,
	{
		let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
		let found = api.get_opt(name).await?.is_some();
		debug!(kind = %K::kind(&K::DynamicType::default()), found, "checked object");
		Ok(found)
	}

	pub async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, kube::Error> {
		self.exists::<ConfigMap>(namespace, name).await
	}
}
