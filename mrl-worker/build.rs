fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The worker serves `worker.proto` and is a client of `master.proto`.
    tonic_build::compile_protos("../protos/worker.proto")?;
    tonic_build::compile_protos("../protos/master.proto")?;
    Ok(())
}
