//! Compiles `proto/raft.proto` into the `StepMessage` gRPC service used to
//! carry raft-rs's opaque protobuf-v2 messages between replicas.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir(std::env::var("OUT_DIR")?)
        .compile_protos(&["proto/raft.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/raft.proto");
    Ok(())
}
