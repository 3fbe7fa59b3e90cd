//! Literal QEMU command lines for both network topologies.

use vmlaunch::{Invocation, Qemu, RunConfig};

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

#[test]
fn test_user_mode_sequence() {
    let config = RunConfig {
        memory: "2G".into(),
        ports: vec![80, 8080],
        image: "image".into(),
        ..RunConfig::default()
    };

    let expected = tokens(
        "-display none -serial stdio \
         -drive file=image,format=raw,index=0 \
         -display none \
         -nodefaults -no-reboot -m 2G -device isa-debug-exit \
         -drive file=image,format=raw,if=virtio \
         -device virtio-net,netdev=n0 \
         -netdev user,id=n0,hostfwd=tcp::80-:80,hostfwd=tcp::8080-:8080",
    );
    assert_eq!(Invocation::build(&config).into_args(), expected);
}

#[test]
fn test_bridged_sequence() {
    let config = RunConfig {
        memory: "1G".into(),
        bridged: true,
        image: "/srv/vm/disk.img".into(),
        ..RunConfig::default()
    };

    let expected = tokens(
        "-display none -serial stdio \
         -drive file=/srv/vm/disk.img,format=raw,index=0 \
         -display none \
         -nodefaults -no-reboot -m 1G -device isa-debug-exit \
         -drive file=/srv/vm/disk.img,format=raw,if=virtio \
         -device virtio-net,netdev=n0,mac=7e:b8:7e:87:4a:ea \
         -netdev tap,id=n0,ifname=tap0 \
         -enable-kvm",
    );
    assert_eq!(Invocation::build(&config).into_args(), expected);
}

#[test]
fn test_bridged_ignores_ports() {
    let with_ports = RunConfig {
        bridged: true,
        ports: vec![22, 443],
        ..RunConfig::default()
    };
    let without_ports = RunConfig {
        bridged: true,
        ..RunConfig::default()
    };
    assert_eq!(Invocation::build(&with_ports), Invocation::build(&without_ports));
}

#[test]
fn test_command_matches_invocation() {
    let config = RunConfig::default();
    let cmd = Qemu::new().command(&config);

    assert_eq!(cmd.get_program(), "qemu-system-x86_64");
    let args: Vec<String> = cmd
        .get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(args, Invocation::build(&config).into_args());
}
