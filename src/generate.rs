//! Spec generation for the two batch modes
//!
//! Build-verification crosses every filtered image with every filtered
//! flavor; load-test mode produces a flat count of identical specs whose
//! start times are spread by uniform random jitter so a big batch does not
//! hit the API as a single burst.

use crate::client::{Flavor, Image};
use crate::task::ServerSpec;
use rand::Rng;
use std::time::Duration;

/// Cross-product of filtered images × filtered flavors, one spec per pair.
///
/// Filters match by substring on the resource name; an empty filter matches
/// everything. Ramp-up is zero — verification runs are bounded by pool
/// width, not jitter.
pub fn image_flavor_pairs(
    images: &[Image],
    flavors: &[Flavor],
    image_filter: &str,
    flavor_filter: &str,
    key_name: Option<&str>,
) -> Vec<ServerSpec> {
    let images = images.iter().filter(|i| i.name.contains(image_filter));

    let mut specs = Vec::new();
    for image in images {
        let flavors = flavors.iter().filter(|f| f.name.contains(flavor_filter));
        for flavor in flavors {
            let mut spec = ServerSpec::default()
                .with_image(image.id.clone())
                .with_flavor(flavor.id.clone());
            if let Some(key) = key_name {
                spec = spec.with_key(key);
            }
            specs.push(spec);
        }
    }
    specs
}

/// `num_servers` identical specs, each with an independent random ramp-up
/// delay drawn uniformly from `[0, ramp_up_max]` inclusive. Image and
/// flavor are left to the account defaults.
pub fn load_test_specs(num_servers: usize, ramp_up_max: Duration) -> Vec<ServerSpec> {
    let mut rng = rand::thread_rng();
    let max_secs = ramp_up_max.as_secs();
    (0..num_servers)
        .map(|_| {
            let delay = Duration::from_secs(rng.gen_range(0..=max_secs));
            ServerSpec::default().with_ramp_up(delay)
        })
        .collect()
}
