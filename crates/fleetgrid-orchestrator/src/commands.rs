//! Admin command lines sent through `ClusterControl::run_command`.

use serde_json::json;

/// Swap the image of a running deployment.
pub fn set_image(container_id: &str, namespace: &str, image_ref: &str) -> String {
    format!("kubectl set image deployment/{container_id} {container_id}={image_ref} -n {namespace}")
}

/// Replace the ports exposed by a container's service.
pub fn patch_service_ports(container_id: &str, namespace: &str, ports: &[u16]) -> String {
    let ports: Vec<_> = ports
        .iter()
        .map(|p| {
            json!({
                "name": format!("port-{p}"),
                "port": p,
                "targetPort": p,
                "protocol": "TCP",
            })
        })
        .collect();
    let patch = json!({ "spec": { "ports": ports } });
    format!("kubectl patch service {container_id} -n {namespace} -p '{patch}'")
}

pub fn attach_autoscaler(
    container_id: &str,
    namespace: &str,
    cpu_percent: u32,
    min: u32,
    max: u32,
) -> String {
    format!(
        "kubectl autoscale deployment {container_id} --cpu-percent={cpu_percent} --min={min} --max={max} -n {namespace}"
    )
}

pub fn detach_autoscaler(container_id: &str, namespace: &str) -> String {
    format!("kubectl delete hpa {container_id} -n {namespace}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_image_targets_named_container() {
        assert_eq!(
            set_image("c-1", "ns-a", "registry/nginx-old"),
            "kubectl set image deployment/c-1 c-1=registry/nginx-old -n ns-a"
        );
    }

    #[test]
    fn port_patch_is_valid_json() {
        let cmd = patch_service_ports("c-1", "ns-a", &[8080]);
        let patch = cmd
            .split_once(" -p '")
            .map(|(_, rest)| rest.trim_end_matches('\''))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(patch).unwrap();
        assert_eq!(value["spec"]["ports"][0]["port"], 8080);
        assert_eq!(value["spec"]["ports"][0]["targetPort"], 8080);
    }

    #[test]
    fn autoscaler_commands() {
        assert_eq!(
            attach_autoscaler("c-1", "ns-a", 70, 1, 5),
            "kubectl autoscale deployment c-1 --cpu-percent=70 --min=1 --max=5 -n ns-a"
        );
        assert_eq!(detach_autoscaler("c-1", "ns-a"), "kubectl delete hpa c-1 -n ns-a");
    }
}
