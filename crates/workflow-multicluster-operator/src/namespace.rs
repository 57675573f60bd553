//! This module provides helpers to deal with the watched namespace

use std::{convert::Infallible, str::FromStr};

use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WatchNamespace {
    All,
    One(String),
}

impl From<&str> for WatchNamespace {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::All
        } else {
            Self::One(s.to_string())
        }
    }
}

impl FromStr for WatchNamespace {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl WatchNamespace {
    /// Gets an API object for the namespace in question or for all
    /// namespaces, depending on which variant we are.
    pub fn get_api<T>(&self, client: &Client) -> Api<T>
    where
        T: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        match self {
            Self::All => Api::all(client.clone()),
            Self::One(namespace) => Api::namespaced(client.clone(), namespace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_watches_all_namespaces() {
        assert_eq!(WatchNamespace::from(""), WatchNamespace::All);
        assert_eq!(
            WatchNamespace::from("argo"),
            WatchNamespace::One("argo".to_string())
        );
    }
}
