//! `docker run` and Compose text derived from a single template.
//!
//! Both generators are total: missing fields fall back to placeholders and the
//! output depends only on the record, field by field in a fixed order.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::template::Template;

/// Image used when a record has none
pub const PLACEHOLDER_IMAGE: &str = "<image>:latest";

/// Service/container name used when a record has neither `name` nor `title`
pub const FALLBACK_SERVICE: &str = "app";

const CONTINUATION: &str = " \\\n  ";

/// Service name: `name`, else `title`, lowercased with non-alphanumeric runs collapsed to `-`
pub fn service_name(template: &Template) -> String {
  let source = template
    .name
    .as_deref()
    .filter(|n| !n.trim().is_empty())
    .or_else(|| template.title())
    .unwrap_or(FALLBACK_SERVICE);

  let slug = slugify(source);
  if slug.is_empty() {
    FALLBACK_SERVICE.to_string()
  } else {
    slug
  }
}

/// ASCII-only: Docker container and compose service names accept nothing
/// else, so other characters act as separators (`Café Bar` becomes `caf-bar`).
pub fn slugify(text: &str) -> String {
  let mut slug = String::with_capacity(text.len());
  let mut pending_dash = false;

  for ch in text.chars().flat_map(char::to_lowercase) {
    if ch.is_ascii_alphanumeric() {
      if pending_dash && !slug.is_empty() {
        slug.push('-');
      }
      pending_dash = false;
      slug.push(ch);
    } else {
      pending_dash = true;
    }
  }

  slug
}

/// Double-quote a shell value, escaping what the shell would expand
fn shell_quote(value: &str) -> String {
  let mut quoted = String::with_capacity(value.len() + 2);
  quoted.push('"');
  for ch in value.chars() {
    if matches!(ch, '"' | '\\' | '$' | '`') {
      quoted.push('\\');
    }
    quoted.push(ch);
  }
  quoted.push('"');
  quoted
}

/// `docker run` invocation, one flag per continuation line
pub fn to_run_command(template: &Template) -> String {
  let mut parts = vec!["docker run -d".to_string(), format!("--name {}", service_name(template))];

  parts.extend(template.ports.iter().map(|port| format!("-p {port}")));

  for env in template.env.iter().filter(|e| !e.name.is_empty()) {
    let value = env.value().unwrap_or_else(|| format!("<{}>", env.name));
    parts.push(format!("-e {}={}", env.name, shell_quote(&value)));
  }

  parts.extend(
    template.volumes.iter().filter(|v| !v.container.is_empty()).map(|v| format!("-v {}", v.mapping())),
  );

  if let Some(policy) = present(&template.restart_policy) {
    parts.push(format!("--restart {policy}"));
  }
  if template.is_privileged() {
    parts.push("--privileged".to_string());
  }
  if let Some(network) = present(&template.network) {
    parts.push(format!("--network {network}"));
  }

  parts.push(template.image().unwrap_or(PLACEHOLDER_IMAGE).to_string());

  if let Some(command) = present(&template.command) {
    parts.push(command.to_string());
  }

  parts.join(CONTINUATION)
}

fn present(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
struct ComposeFile {
  services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Default, Serialize)]
struct ComposeService {
  #[serde(skip_serializing_if = "Option::is_none")]
  image: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  ports: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  environment: Vec<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  volumes: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  restart: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  privileged: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  network_mode: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  command: Option<String>,
}

/// Minimal single-service Compose document
pub fn to_compose_file(template: &Template) -> String {
  let service = ComposeService {
    image: template.image().map(str::to_string),
    ports: template.ports.iter().map(ToString::to_string).collect(),
    environment: template
      .env
      .iter()
      .filter(|e| !e.name.is_empty())
      .map(|e| format!("{}={}", e.name, e.value().unwrap_or_default()))
      .collect(),
    volumes: template
      .volumes
      .iter()
      .filter(|v| !v.container.is_empty())
      .map(|v| v.mapping())
      .collect(),
    restart: present(&template.restart_policy).map(str::to_string),
    privileged: template.is_privileged().then_some(true),
    network_mode: present(&template.network).map(str::to_string),
    command: present(&template.command).map(str::to_string),
  };

  let file = ComposeFile { services: BTreeMap::from([(service_name(template), service)]) };
  serde_yaml::to_string(&file).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn template(value: serde_json::Value) -> Template {
    Template::from_value(value).unwrap()
  }

  #[test]
  fn test_run_command_field_order() {
    let t = template(json!({
      "name": "app",
      "image": "img:1",
      "ports": [80],
      "env": [{"name": "X", "default": "1"}]
    }));
    let command = to_run_command(&t);

    let order = ["docker run -d", "--name app", "-p 80", "-e X=\"1\"", "img:1"];
    let positions: Vec<usize> = order.iter().map(|needle| command.find(needle).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {command}");
    assert!(command.ends_with("img:1"));
  }

  #[test]
  fn test_run_command_full() {
    let t = template(json!({
      "title": "Home Assistant",
      "image": "homeassistant/home-assistant:stable",
      "ports": ["8123:8123/tcp"],
      "env": [{"name": "TZ", "preset": "UTC"}, {"name": "TOKEN"}],
      "volumes": [{"container": "/config", "bind": "/srv/ha"}, {"container": "/media"}],
      "restart_policy": "unless-stopped",
      "privileged": true,
      "network": "host",
      "command": "--verbose"
    }));

    let expected = [
      "docker run -d",
      "--name home-assistant",
      "-p 8123:8123/tcp",
      "-e TZ=\"UTC\"",
      "-e TOKEN=\"<TOKEN>\"",
      "-v /srv/ha:/config",
      "-v /media",
      "--restart unless-stopped",
      "--privileged",
      "--network host",
      "homeassistant/home-assistant:stable",
      "--verbose",
    ]
    .join(" \\\n  ");
    assert_eq!(to_run_command(&t), expected);
  }

  #[test]
  fn test_run_command_defaults_for_empty_record() {
    let command = to_run_command(&Template::default());
    assert_eq!(command, "docker run -d \\\n  --name app \\\n  <image>:latest");
  }

  #[test]
  fn test_env_values_are_shell_quoted() {
    let t = template(json!({"name": "x", "env": [{"name": "PASS", "default": "a\"b$c"}]}));
    assert!(to_run_command(&t).contains(r#"-e PASS="a\"b\$c""#));
  }

  #[test]
  fn test_run_command_is_deterministic() {
    let t = template(json!({"name": "x", "ports": [1, 2], "env": [{"name": "A"}]}));
    assert_eq!(to_run_command(&t), to_run_command(&t));
  }

  #[test]
  fn test_service_name() {
    assert_eq!(service_name(&template(json!({"name": "My_App"}))), "my-app");
    assert_eq!(service_name(&template(json!({"title": "  Nginx Proxy Manager! "}))), "nginx-proxy-manager");
    assert_eq!(service_name(&template(json!({"title": "!!!"}))), "app");
    assert_eq!(service_name(&Template::default()), "app");
  }

  #[test]
  fn test_slugify_keeps_names_docker_accepts() {
    assert_eq!(slugify("Café Bar"), "caf-bar");
    assert_eq!(slugify("Ünïcode"), "n-code");
    assert_eq!(slugify("日本"), "");
    assert!(slugify("Wiki.js 2 (Beta)").chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
  }

  #[test]
  fn test_compose_file_structure() {
    let t = template(json!({
      "name": "app",
      "image": "img:1",
      "ports": [80, "443:443"],
      "env": [{"name": "X", "default": "1"}, {"name": "Y"}],
      "volumes": [{"container": "/data", "bind": "/srv"}],
      "restart_policy": "always",
      "privileged": true,
      "network": "host",
      "command": "serve"
    }));
    let yaml: serde_yaml::Value = serde_yaml::from_str(&to_compose_file(&t)).unwrap();
    let service = &yaml["services"]["app"];

    assert_eq!(service["image"], "img:1");
    assert_eq!(service["ports"][0], "80");
    assert_eq!(service["ports"][1], "443:443");
    assert_eq!(service["environment"][0], "X=1");
    assert_eq!(service["environment"][1], "Y=");
    assert_eq!(service["volumes"][0], "/srv:/data");
    assert_eq!(service["restart"], "always");
    assert_eq!(service["privileged"], true);
    assert_eq!(service["network_mode"], "host");
    assert_eq!(service["command"], "serve");
  }

  #[test]
  fn test_compose_omits_absent_fields() {
    let t = template(json!({"title": "Bare", "image": "bare", "privileged": false}));
    let text = to_compose_file(&t);
    assert_eq!(text, "services:\n  bare:\n    image: bare\n");
  }

  #[test]
  fn test_compose_keys_in_fixed_order() {
    let t = template(json!({"name": "o", "command": "c", "image": "i", "restart_policy": "r"}));
    let text = to_compose_file(&t);
    let image = text.find("image:").unwrap();
    let restart = text.find("restart:").unwrap();
    let command = text.find("command:").unwrap();
    assert!(image < restart && restart < command);
  }
}
