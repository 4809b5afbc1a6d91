mod rig_stream;

pub use rig_stream::RigLlm;
