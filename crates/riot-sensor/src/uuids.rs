//! GATT 服务与特征 UUID
//!
//! 固件使用同一个基址，只有第一段不同。

pub const LUX_SERVICE: &str = "7b2e1000-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const LUX_SEQUENCE: &str = "7b2e1001-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const LUX_VALUE: &str = "7b2e1002-5c1a-4f6e-9d3a-8f21c0a1d300";

pub const MOTION_SERVICE: &str = "7b2e2000-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_SEQUENCE: &str = "7b2e2001-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_GYRO_X: &str = "7b2e2002-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_GYRO_Y: &str = "7b2e2003-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_GYRO_Z: &str = "7b2e2004-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_ACCEL_X: &str = "7b2e2005-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_ACCEL_Y: &str = "7b2e2006-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_ACCEL_Z: &str = "7b2e2007-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_MAG_X: &str = "7b2e2008-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_MAG_Y: &str = "7b2e2009-5c1a-4f6e-9d3a-8f21c0a1d300";
pub const MOTION_MAG_Z: &str = "7b2e200a-5c1a-4f6e-9d3a-8f21c0a1d300";
