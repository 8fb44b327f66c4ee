use std::path::Path;

/// Builder for the fixed command vectors of the container-control backend
/// (`lxc` by default). Vectors are opaque data handed to the execution
/// paths; nothing here spawns anything or parses backend output.
#[derive(Debug, Clone)]
pub struct Backend {
    binary: String,
}

impl Backend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn vector<I, S>(&self, parts: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        std::iter::once(self.binary.clone())
            .chain(parts.into_iter().map(Into::into))
            .collect()
    }

    pub fn list(&self) -> Vec<String> {
        self.vector(["list"])
    }

    pub fn init(&self, image: &str, name: &str) -> Vec<String> {
        self.vector(["init", image, name])
    }

    pub fn start(&self, name: &str) -> Vec<String> {
        self.vector(["start", name])
    }

    pub fn stop(&self, name: &str) -> Vec<String> {
        self.vector(["stop", name])
    }

    pub fn restart(&self, name: &str) -> Vec<String> {
        self.vector(["restart", name])
    }

    pub fn delete(&self, name: &str) -> Vec<String> {
        self.vector(["delete", name])
    }

    /// Interactive login shell inside a container; bridged, not captured.
    pub fn shell(&self, name: &str) -> Vec<String> {
        self.vector(["exec", name, "--", "/bin/bash", "-l"])
    }

    pub fn file_push(&self, local: &Path, name: &str, file: &str) -> Vec<String> {
        self.vector([
            "file".to_string(),
            "push".to_string(),
            local.display().to_string(),
            format!("{name}/root/{file}"),
        ])
    }

    pub fn file_pull(&self, name: &str, file: &str, local_dir: &Path) -> Vec<String> {
        self.vector([
            "file".to_string(),
            "pull".to_string(),
            format!("{name}/root/{file}"),
            local_dir.display().to_string(),
        ])
    }

    pub fn proxy_add(&self, name: &str, device: &str, listen: &str, connect: &str) -> Vec<String> {
        self.vector([
            "config".to_string(),
            "device".to_string(),
            "add".to_string(),
            name.to_string(),
            device.to_string(),
            "proxy".to_string(),
            format!("listen={listen}"),
            format!("connect={connect}"),
        ])
    }

    pub fn proxy_remove(&self, name: &str, device: &str) -> Vec<String> {
        self.vector(["config", "device", "remove", name, device])
    }

    pub fn config_set(&self, name: &str, key: &str, value: &str) -> Vec<String> {
        self.vector(["config", "set", name, key, value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lxc() -> Backend {
        Backend::new("lxc")
    }

    #[test]
    fn lifecycle_vectors() {
        assert_eq!(lxc().list(), ["lxc", "list"]);
        assert_eq!(lxc().init("ubuntu:22.04", "box1"), ["lxc", "init", "ubuntu:22.04", "box1"]);
        assert_eq!(lxc().start("box1"), ["lxc", "start", "box1"]);
        assert_eq!(lxc().stop("box1"), ["lxc", "stop", "box1"]);
        assert_eq!(lxc().restart("box1"), ["lxc", "restart", "box1"]);
        assert_eq!(lxc().delete("box1"), ["lxc", "delete", "box1"]);
    }

    #[test]
    fn shell_vector_requests_a_login_shell() {
        assert_eq!(
            lxc().shell("box1"),
            ["lxc", "exec", "box1", "--", "/bin/bash", "-l"]
        );
    }

    #[test]
    fn file_transfer_vectors_stage_under_root() {
        assert_eq!(
            lxc().file_push(Path::new("/store/notes.txt"), "box1", "notes.txt"),
            ["lxc", "file", "push", "/store/notes.txt", "box1/root/notes.txt"]
        );
        assert_eq!(
            lxc().file_pull("box1", "notes.txt", Path::new("/store")),
            ["lxc", "file", "pull", "box1/root/notes.txt", "/store"]
        );
    }

    #[test]
    fn proxy_vectors() {
        assert_eq!(
            lxc().proxy_add("box1", "web", "tcp:0.0.0.0:8080", "tcp:127.0.0.1:80"),
            [
                "lxc",
                "config",
                "device",
                "add",
                "box1",
                "web",
                "proxy",
                "listen=tcp:0.0.0.0:8080",
                "connect=tcp:127.0.0.1:80"
            ]
        );
        assert_eq!(
            lxc().proxy_remove("box1", "web"),
            ["lxc", "config", "device", "remove", "box1", "web"]
        );
    }

    #[test]
    fn config_set_vector() {
        assert_eq!(
            lxc().config_set("box1", "limits.cpu", "2"),
            ["lxc", "config", "set", "box1", "limits.cpu", "2"]
        );
    }

    #[test]
    fn alternate_backend_binary_is_respected() {
        let incus = Backend::new("incus");
        assert_eq!(incus.list(), ["incus", "list"]);
    }
}
