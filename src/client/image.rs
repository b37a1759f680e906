use super::{DockerClient, reference};
use super::model::{ImageInspect, ImageSummary};
use crate::error::Result;
use crate::transport::{Request, Transport};

/// Image endpoints.
pub struct ImageOps<'a, T: Transport> {
    client: &'a DockerClient<T>,
}

impl<'a, T: Transport> ImageOps<'a, T> {
    pub(super) fn new(client: &'a DockerClient<T>) -> Self {
        Self { client }
    }

    /// Top-level images, or intermediate layers too when `all` is set.
    pub fn list(&self, all: bool) -> Result<Vec<ImageSummary>> {
        self.client
            .get_json(Request::get("/images/json").flag("all", all))
    }

    /// `name` may be an id or a `repo:tag` reference.
    pub fn inspect(&self, name: &str) -> Result<ImageInspect> {
        self.client
            .get_json(Request::get(format!("/images/{}/json", reference(name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::CannedTransport;

    #[test]
    fn inspect_by_reference() {
        let c = DockerClient::with_transport(
            CannedTransport::new(vec![(
                200,
                r#"{"Id":"sha256:1","RepoTags":["alpine:3.19"],"Os":"linux","Architecture":"arm64"}"#,
            )]),
            None,
        );
        let image = c.image().inspect("alpine:3.19").unwrap();
        assert_eq!(image.repo_tags.unwrap(), vec!["alpine:3.19"]);
        assert_eq!(image.architecture, "arm64");
        assert_eq!(c.transport().targets(), vec!["GET /images/alpine:3.19/json"]);
    }

    #[test]
    fn namespaced_reference_keeps_its_slash() {
        let c = DockerClient::with_transport(CannedTransport::new(vec![(200, "{}")]), None);
        c.image().inspect("library/alpine:3.19").unwrap();
        assert_eq!(
            c.transport().targets(),
            vec!["GET /images/library/alpine:3.19/json"]
        );
    }

    #[test]
    fn list_tolerates_null_tags() {
        let c = DockerClient::with_transport(
            CannedTransport::new(vec![(200, r#"[{"Id":"sha256:2","RepoTags":null,"Size":10}]"#)]),
            None,
        );
        let images = c.image().list(false).unwrap();
        assert!(images[0].repo_tags.is_none());
        assert_eq!(c.transport().targets(), vec!["GET /images/json?all=0"]);
    }
}
