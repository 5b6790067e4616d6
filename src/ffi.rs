//! C FFI layer for loading the bridge as a host runtime plugin.
//!
//! The host hands over a table of callbacks implementing its side of
//! [`HostRuntime`] and receives an opaque provider handle.
//! The generated C header is written to `include/hvr_bridge.h` by cbindgen.

use crate::config::BridgeConfig;
use crate::error::LastError;
use crate::host::{
    ComponentHandle, DeviceIndex, DriverPose, HostEvent, HostRuntime, ScalarUnits,
    TrackingResult, EVENT_HAPTIC_VIBRATION, INVALID_COMPONENT,
};
use crate::provider::DeviceProvider;
use crate::types::DeviceClass;
use crate::{BridgeError, Result};
use std::ffi::{c_char, c_void, CString};
use std::sync::Arc;

/// Last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque provider handle for C consumers.
pub struct HvrProvider(DeviceProvider);

/// Pose in C-compatible layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HvrPose {
    /// Position [x, y, z] in meters, recentered.
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    /// Orientation quaternion [w, x, y, z].
    pub orientation: [f64; 4],
    pub angular_velocity: [f64; 3],
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
    pub result: TrackingResult,
}

impl From<&DriverPose> for HvrPose {
    fn from(pose: &DriverPose) -> Self {
        let q = pose.orientation;
        HvrPose {
            position: pose.position,
            velocity: pose.velocity,
            orientation: [q.w, q.x, q.y, q.z],
            angular_velocity: pose.angular_velocity,
            pose_is_valid: pose.pose_is_valid,
            device_is_connected: pose.device_is_connected,
            result: pose.result,
        }
    }
}

/// Host runtime event in C-compatible layout.
///
/// `component`, `duration_s`, `frequency` and `amplitude` are only read
/// when `event_type` is the haptic vibration code (1700).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HvrEvent {
    pub event_type: u32,
    pub component: u64,
    pub duration_s: f32,
    pub frequency: f32,
    pub amplitude: f32,
}

impl From<HvrEvent> for HostEvent {
    fn from(raw: HvrEvent) -> Self {
        match raw.event_type {
            EVENT_HAPTIC_VIBRATION => HostEvent::HapticVibration {
                component: raw.component,
                duration_s: raw.duration_s,
                frequency: raw.frequency,
                amplitude: raw.amplitude,
            },
            other => HostEvent::Other(other),
        }
    }
}

/// Host runtime callbacks. Every function pointer is required.
///
/// Callbacks are invoked from both the session thread and the thread calling
/// `hvr_provider_run_frame`, so they must be thread-safe.
#[repr(C)]
pub struct HvrHostCallbacks {
    /// Passed back unchanged as the first argument of every callback.
    pub user_data: *mut c_void,
    /// Register a device; write its index to `out_index` and return true on success.
    pub register_device: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            serial: *const c_char,
            class: DeviceClass,
            out_index: *mut u32,
        ) -> bool,
    >,
    pub submit_pose:
        Option<unsafe extern "C" fn(user_data: *mut c_void, index: u32, pose: *const HvrPose)>,
    /// Pop the next pending event into `out`; return false when the queue is empty.
    pub poll_event: Option<unsafe extern "C" fn(user_data: *mut c_void, out: *mut HvrEvent) -> bool>,
    pub create_boolean_component: Option<
        unsafe extern "C" fn(user_data: *mut c_void, index: u32, path: *const c_char) -> u64,
    >,
    pub create_scalar_component: Option<
        unsafe extern "C" fn(
            user_data: *mut c_void,
            index: u32,
            path: *const c_char,
            units: ScalarUnits,
        ) -> u64,
    >,
    pub create_haptic_component: Option<
        unsafe extern "C" fn(user_data: *mut c_void, index: u32, path: *const c_char) -> u64,
    >,
    pub update_boolean_component: Option<
        unsafe extern "C" fn(user_data: *mut c_void, handle: u64, value: bool, time_offset_s: f64),
    >,
    pub update_scalar_component: Option<
        unsafe extern "C" fn(user_data: *mut c_void, handle: u64, value: f32, time_offset_s: f64),
    >,
}

type RegisterFn = unsafe extern "C" fn(*mut c_void, *const c_char, DeviceClass, *mut u32) -> bool;
type SubmitPoseFn = unsafe extern "C" fn(*mut c_void, u32, *const HvrPose);
type PollEventFn = unsafe extern "C" fn(*mut c_void, *mut HvrEvent) -> bool;
type CreateComponentFn = unsafe extern "C" fn(*mut c_void, u32, *const c_char) -> u64;
type CreateScalarFn = unsafe extern "C" fn(*mut c_void, u32, *const c_char, ScalarUnits) -> u64;
type UpdateBooleanFn = unsafe extern "C" fn(*mut c_void, u64, bool, f64);
type UpdateScalarFn = unsafe extern "C" fn(*mut c_void, u64, f32, f64);

/// [`HostRuntime`] backed by a C callback table.
struct FfiHost {
    user_data: *mut c_void,
    register_device: RegisterFn,
    submit_pose: SubmitPoseFn,
    poll_event: PollEventFn,
    create_boolean_component: CreateComponentFn,
    create_scalar_component: CreateScalarFn,
    create_haptic_component: CreateComponentFn,
    update_boolean_component: UpdateBooleanFn,
    update_scalar_component: UpdateScalarFn,
}

// SAFETY: the callback contract requires the host to accept calls from any
// thread, and `user_data` is only ever passed back to those callbacks.
unsafe impl Send for FfiHost {}
unsafe impl Sync for FfiHost {}

fn required<T>(callback: Option<T>, name: &str) -> Result<T> {
    callback.ok_or_else(|| BridgeError::InvalidConfig(format!("missing host callback: {}", name)))
}

impl FfiHost {
    fn new(callbacks: &HvrHostCallbacks) -> Result<FfiHost> {
        Ok(FfiHost {
            user_data: callbacks.user_data,
            register_device: required(callbacks.register_device, "register_device")?,
            submit_pose: required(callbacks.submit_pose, "submit_pose")?,
            poll_event: required(callbacks.poll_event, "poll_event")?,
            create_boolean_component: required(
                callbacks.create_boolean_component,
                "create_boolean_component",
            )?,
            create_scalar_component: required(
                callbacks.create_scalar_component,
                "create_scalar_component",
            )?,
            create_haptic_component: required(
                callbacks.create_haptic_component,
                "create_haptic_component",
            )?,
            update_boolean_component: required(
                callbacks.update_boolean_component,
                "update_boolean_component",
            )?,
            update_scalar_component: required(
                callbacks.update_scalar_component,
                "update_scalar_component",
            )?,
        })
    }

    fn create_component(
        &self,
        create: CreateComponentFn,
        index: DeviceIndex,
        path: &str,
    ) -> ComponentHandle {
        match CString::new(path) {
            // SAFETY: callback and user_data come from the host's table; the
            // path outlives the call.
            Ok(path) => unsafe { create(self.user_data, index, path.as_ptr()) },
            Err(_) => INVALID_COMPONENT,
        }
    }
}

impl HostRuntime for FfiHost {
    fn register_device(&self, serial: &str, class: DeviceClass) -> Option<DeviceIndex> {
        let serial = match CString::new(serial) {
            Ok(serial) => serial,
            Err(e) => {
                log::warn!("Serial number not representable in C: {}", e);
                return None;
            }
        };
        let mut index: u32 = 0;
        // SAFETY: see `create_component`; `index` is a valid out pointer.
        let ok =
            unsafe { (self.register_device)(self.user_data, serial.as_ptr(), class, &mut index) };
        ok.then_some(index)
    }

    fn submit_pose(&self, index: DeviceIndex, pose: &DriverPose) {
        let raw = HvrPose::from(pose);
        // SAFETY: `raw` lives across the call.
        unsafe { (self.submit_pose)(self.user_data, index, &raw) }
    }

    fn poll_event(&self) -> Option<HostEvent> {
        let mut raw = HvrEvent::default();
        // SAFETY: `raw` is a valid out pointer.
        let pending = unsafe { (self.poll_event)(self.user_data, &mut raw) };
        pending.then(|| raw.into())
    }

    fn create_boolean_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.create_component(self.create_boolean_component, index, path)
    }

    fn create_scalar_component(
        &self,
        index: DeviceIndex,
        path: &str,
        units: ScalarUnits,
    ) -> ComponentHandle {
        match CString::new(path) {
            // SAFETY: see `create_component`.
            Ok(path) => unsafe {
                (self.create_scalar_component)(self.user_data, index, path.as_ptr(), units)
            },
            Err(_) => INVALID_COMPONENT,
        }
    }

    fn create_haptic_component(&self, index: DeviceIndex, path: &str) -> ComponentHandle {
        self.create_component(self.create_haptic_component, index, path)
    }

    fn update_boolean_component(&self, handle: ComponentHandle, value: bool, time_offset_s: f64) {
        // SAFETY: plain values only.
        unsafe { (self.update_boolean_component)(self.user_data, handle, value, time_offset_s) }
    }

    fn update_scalar_component(&self, handle: ComponentHandle, value: f32, time_offset_s: f64) {
        // SAFETY: plain values only.
        unsafe { (self.update_scalar_component)(self.user_data, handle, value, time_offset_s) }
    }
}

/// Start the bridge listening on `port` (0 picks an ephemeral port).
///
/// Other settings come from the `HVR_BRIDGE_*` environment variables.
/// Returns NULL on error (check hvr_last_error()).
///
/// # Safety
/// `callbacks` must point to a valid `HvrHostCallbacks`, or be null. The table
/// is copied; `user_data` must stay valid until `hvr_provider_cleanup`.
#[no_mangle]
pub unsafe extern "C" fn hvr_provider_init(
    callbacks: *const HvrHostCallbacks,
    port: u16,
) -> *mut HvrProvider {
    if callbacks.is_null() {
        LAST_ERROR.set(&BridgeError::InvalidConfig(
            "host callbacks are null".to_string(),
        ));
        return std::ptr::null_mut();
    }

    let started = FfiHost::new(&*callbacks).and_then(|host| {
        DeviceProvider::init(Arc::new(host), BridgeConfig::from_env().with_port(port))
    });
    match started {
        Ok(provider) => Box::into_raw(Box::new(HvrProvider(provider))),
        Err(e) => {
            LAST_ERROR.set(&e);
            std::ptr::null_mut()
        }
    }
}

/// Run one host runtime frame: dispatch pending events, refresh inputs.
///
/// # Safety
/// `provider` must be a valid provider pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hvr_provider_run_frame(provider: *const HvrProvider) {
    if provider.is_null() {
        return;
    }
    let provider = &*provider;
    provider.0.run_frame();
}

/// Port the bridge is listening on, or 0 for a null provider.
///
/// # Safety
/// `provider` must be a valid provider pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hvr_provider_local_port(provider: *const HvrProvider) -> u16 {
    if provider.is_null() {
        return 0;
    }
    let provider = &*provider;
    provider.0.local_addr().port()
}

/// Number of devices currently bound to a connected peripheral.
///
/// # Safety
/// `provider` must be a valid provider pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn hvr_provider_active_devices(provider: *const HvrProvider) -> u32 {
    if provider.is_null() {
        return 0;
    }
    let provider = &*provider;
    provider.0.active_devices() as u32
}

/// Announce removal of every device, close all connections and free the provider.
///
/// Must be called before the host runtime tears down its side of the callbacks.
///
/// # Safety
/// `provider` must be a pointer returned by `hvr_provider_init`, or null.
#[no_mangle]
pub unsafe extern "C" fn hvr_provider_cleanup(provider: *mut HvrProvider) {
    if !provider.is_null() {
        let provider = *Box::from_raw(provider);
        provider.0.cleanup();
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next hvr_bridge API call.
#[no_mangle]
pub extern "C" fn hvr_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientEvent, PeripheralClient};
    use crate::types::{DeviceDescriptor, Quat};
    use std::ffi::CStr;
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        serials: Mutex<Vec<(String, DeviceClass)>>,
        poses: Mutex<Vec<(u32, HvrPose)>>,
        pending: Mutex<Vec<HvrEvent>>,
        components: Mutex<Vec<String>>,
    }

    unsafe fn recorder<'a>(user_data: *mut c_void) -> &'a Recorder {
        &*(user_data as *const Recorder)
    }

    unsafe extern "C" fn register(
        user_data: *mut c_void,
        serial: *const c_char,
        class: DeviceClass,
        out_index: *mut u32,
    ) -> bool {
        let mut serials = recorder(user_data).serials.lock().unwrap();
        serials.push((CStr::from_ptr(serial).to_string_lossy().into_owned(), class));
        *out_index = serials.len() as u32 - 1;
        true
    }

    unsafe extern "C" fn submit_pose(user_data: *mut c_void, index: u32, pose: *const HvrPose) {
        recorder(user_data).poses.lock().unwrap().push((index, *pose));
    }

    unsafe extern "C" fn poll_event(user_data: *mut c_void, out: *mut HvrEvent) -> bool {
        match recorder(user_data).pending.lock().unwrap().pop() {
            Some(event) => {
                *out = event;
                true
            }
            None => false,
        }
    }

    unsafe extern "C" fn create_component(
        user_data: *mut c_void,
        _index: u32,
        path: *const c_char,
    ) -> u64 {
        let mut components = recorder(user_data).components.lock().unwrap();
        components.push(CStr::from_ptr(path).to_string_lossy().into_owned());
        components.len() as u64
    }

    unsafe extern "C" fn create_scalar(
        user_data: *mut c_void,
        index: u32,
        path: *const c_char,
        _units: ScalarUnits,
    ) -> u64 {
        create_component(user_data, index, path)
    }

    unsafe extern "C" fn update_boolean(_: *mut c_void, _: u64, _: bool, _: f64) {}

    unsafe extern "C" fn update_scalar(_: *mut c_void, _: u64, _: f32, _: f64) {}

    fn callbacks(recorder: &Recorder) -> HvrHostCallbacks {
        HvrHostCallbacks {
            user_data: recorder as *const Recorder as *mut c_void,
            register_device: Some(register),
            submit_pose: Some(submit_pose),
            poll_event: Some(poll_event),
            create_boolean_component: Some(create_component),
            create_scalar_component: Some(create_scalar),
            create_haptic_component: Some(create_component),
            update_boolean_component: Some(update_boolean),
            update_scalar_component: Some(update_scalar),
        }
    }

    #[test]
    fn test_pose_layout_conversion() {
        let pose = DriverPose {
            position: [1.0, 2.0, 3.0],
            orientation: Quat::new(0.5, 0.1, 0.2, 0.3),
            pose_is_valid: true,
            ..DriverPose::default()
        };
        let raw = HvrPose::from(&pose);
        assert_eq!(raw.position, [1.0, 2.0, 3.0]);
        assert_eq!(raw.orientation, [0.5, 0.1, 0.2, 0.3]);
        assert!(raw.pose_is_valid && !raw.device_is_connected);
    }

    #[test]
    fn test_event_conversion() {
        let haptic = HvrEvent {
            event_type: EVENT_HAPTIC_VIBRATION,
            component: 7,
            duration_s: 0.5,
            frequency: 100.0,
            amplitude: 0.25,
        };
        assert_eq!(
            HostEvent::from(haptic),
            HostEvent::HapticVibration {
                component: 7,
                duration_s: 0.5,
                frequency: 100.0,
                amplitude: 0.25,
            }
        );
        let other = HvrEvent {
            event_type: 3,
            ..HvrEvent::default()
        };
        assert_eq!(HostEvent::from(other), HostEvent::Other(3));
    }

    #[test]
    fn test_init_rejects_incomplete_callbacks() {
        unsafe {
            assert!(hvr_provider_init(std::ptr::null(), 0).is_null());
            assert!(!hvr_last_error().is_null());

            let recorder = Recorder::default();
            let mut table = callbacks(&recorder);
            table.poll_event = None;
            assert!(hvr_provider_init(&table, 0).is_null());
            let message = CStr::from_ptr(hvr_last_error()).to_string_lossy().into_owned();
            assert!(message.contains("poll_event"));

            hvr_provider_run_frame(std::ptr::null());
            hvr_provider_cleanup(std::ptr::null_mut());
            assert_eq!(hvr_provider_local_port(std::ptr::null()), 0);
        }
    }

    #[test]
    fn test_provider_through_callbacks() {
        let recorder = Recorder::default();
        let table = callbacks(&recorder);
        unsafe {
            let provider = hvr_provider_init(&table, 0);
            assert!(!provider.is_null());
            let port = hvr_provider_local_port(provider);
            assert_ne!(port, 0);

            let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port);
            let mut client = PeripheralClient::connect(addr, DeviceDescriptor::default()).unwrap();
            client
                .wait_for(Duration::from_secs(5), |e| {
                    matches!(e, ClientEvent::Identity(_))
                })
                .unwrap();
            assert_eq!(hvr_provider_active_devices(provider), 1);
            assert_eq!(
                recorder.serials.lock().unwrap()[0],
                ("hvr_tracker-1".to_string(), DeviceClass::GenericTracker)
            );
            assert!(recorder
                .components
                .lock()
                .unwrap()
                .contains(&"/input/trigger/value".to_string()));

            recorder.pending.lock().unwrap().push(HvrEvent {
                event_type: 42,
                ..HvrEvent::default()
            });
            hvr_provider_run_frame(provider);
            assert!(recorder.pending.lock().unwrap().is_empty());

            hvr_provider_cleanup(provider);
            let (index, last) = *recorder.poses.lock().unwrap().last().unwrap();
            assert_eq!(index, 0);
            assert!(!last.device_is_connected);
        }
    }
}
