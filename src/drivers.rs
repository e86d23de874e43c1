pub mod cooling_hat;
