use tracing::debug;

use super::{DockerClient, segment};
use super::filters::Filters;
use super::model::{Volume, VolumeCreate, VolumesListResponse};
use crate::error::Result;
use crate::transport::{Request, Transport};

/// Volume endpoints.
pub struct VolumeOps<'a, T: Transport> {
    client: &'a DockerClient<T>,
}

impl<'a, T: Transport> VolumeOps<'a, T> {
    pub(super) fn new(client: &'a DockerClient<T>) -> Self {
        Self { client }
    }

    pub fn list(&self) -> ListVolume<'a, T> {
        ListVolume {
            client: self.client,
            filters: Filters::new(),
        }
    }

    pub fn inspect(&self, name: &str) -> Result<Volume> {
        self.client.get_json(Request::get(format!("/volumes/{}", segment(name))))
    }

    pub fn create(&self, spec: &VolumeCreate) -> Result<Volume> {
        let request = Request::post("/volumes/create").json(spec)?;
        self.client.send(request)?.json()
    }

    pub fn remove(&self, name: &str, force: bool) -> Result<()> {
        let mut request = Request::delete(format!("/volumes/{}", segment(name)));
        if force {
            request = request.flag("force", true);
        }
        self.client.send(request)?;
        Ok(())
    }
}

/// `GET /volumes`, optionally filtered.
pub struct ListVolume<'a, T: Transport> {
    client: &'a DockerClient<T>,
    filters: Filters,
}

impl<'a, T: Transport> ListVolume<'a, T> {
    /// Filter on `key` (`name`, `driver`, `label`, `dangling`). Setting the
    /// same key again replaces its value.
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.set(key, value);
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn all(self) -> Result<Vec<Volume>> {
        let request = self.filters.apply(Request::get("/volumes"))?;
        let response: VolumesListResponse = self.client.get_json(request)?;
        for warning in response.warnings.iter().flatten() {
            debug!(%warning, "engine warning while listing volumes");
        }
        Ok(response.volumes.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::CannedTransport;

    fn client(replies: Vec<(u16, &str)>) -> DockerClient<CannedTransport> {
        DockerClient::with_transport(CannedTransport::new(replies), None)
    }

    #[test]
    fn list_without_filters() {
        let c = client(vec![(
            200,
            r#"{"Volumes":[{"Name":"a","Driver":"local"},{"Name":"b","Driver":"local"}],"Warnings":null}"#,
        )]);
        let names: Vec<String> = c
            .volume()
            .list()
            .all()
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(c.transport().targets(), vec!["GET /volumes"]);
    }

    #[test]
    fn list_with_filters_encodes_json() {
        let c = client(vec![(200, r#"{"Volumes":null}"#)]);
        let volumes = c
            .volume()
            .list()
            .filter("dangling", "true")
            .filter("dangling", "false")
            .all()
            .unwrap();
        assert!(volumes.is_empty());

        let requests = c.transport().requests.lock().unwrap();
        assert_eq!(
            requests[0].query_pairs(),
            &[("filters".to_string(), r#"{"dangling":["false"]}"#.to_string())]
        );
    }

    #[test]
    fn create_posts_json_body() {
        let c = client(vec![(201, r#"{"Name":"cache","Driver":"local"}"#)]);
        let spec = VolumeCreate {
            name: Some("cache".into()),
            ..VolumeCreate::default()
        };
        let vol = c.volume().create(&spec).unwrap();
        assert_eq!(vol.name, "cache");

        let requests = c.transport().requests.lock().unwrap();
        assert_eq!(requests[0].path(), "/volumes/create");
        assert_eq!(requests[0].body(), Some(&br#"{"Name":"cache"}"#[..]));
    }

    #[test]
    fn inspect_missing_volume_is_not_found() {
        let c = client(vec![(404, r#"{"message":"get ghost: no such volume"}"#)]);
        let err = c.volume().inspect("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn names_are_escaped_in_paths() {
        let c = client(vec![(200, r#"{"Name":"my vol?x"}"#), (204, "")]);
        assert_eq!(c.volume().inspect("my vol?x").unwrap().name, "my vol?x");
        c.volume().remove("my vol?x", false).unwrap();
        assert_eq!(
            c.transport().targets(),
            vec!["GET /volumes/my%20vol%3Fx", "DELETE /volumes/my%20vol%3Fx"]
        );
    }

    #[test]
    fn remove_with_force() {
        let c = client(vec![(204, "")]);
        c.volume().remove("old", true).unwrap();
        assert_eq!(c.transport().targets(), vec!["DELETE /volumes/old?force=1"]);
    }
}
