pub mod correlation;
pub mod fingerprint;
pub mod residual;
