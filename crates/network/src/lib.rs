//! Wi-Fi provisioning and network-based geolocation.

pub mod error;
pub mod geo;
pub mod wpa;

pub use {
    error::{Error, Result},
    geo::{Coordinates, Geolocator, GoogleGeolocator, Place},
    wpa::{NetworkProvisioner, ScannedNetwork, WpaCliProvisioner},
};
