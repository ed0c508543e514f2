//! Windows endpoint volume through `IAudioEndpointVolume`.

use windows::Win32::Media::Audio::Endpoints::IAudioEndpointVolume;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, EDataFlow, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CLSCTX_ALL, COINIT_MULTITHREADED,
};

use super::{VolumeEndpoint, VolumeError};

/// Master volume of a default endpoint.  COM interfaces are bound to the
/// thread that created them, so build this on the loop thread.
pub struct WasapiEndpoint {
    name: &'static str,
    volume: IAudioEndpointVolume,
}

impl WasapiEndpoint {
    pub fn speaker() -> Result<Self, VolumeError> {
        Self::default_endpoint("speaker", eRender)
    }

    pub fn microphone() -> Result<Self, VolumeError> {
        Self::default_endpoint("microphone", eCapture)
    }

    fn default_endpoint(name: &'static str, flow: EDataFlow) -> Result<Self, VolumeError> {
        let fail = |e: windows::core::Error| VolumeError::Endpoint {
            endpoint: name,
            reason: e.to_string(),
        };

        unsafe {
            // Already initialised on this thread is fine.
            let _ = CoInitializeEx(None, COINIT_MULTITHREADED);

            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).map_err(fail)?;
            let device: IMMDevice = enumerator
                .GetDefaultAudioEndpoint(flow, eConsole)
                .map_err(fail)?;
            let volume = device
                .Activate::<IAudioEndpointVolume>(CLSCTX_ALL, None)
                .map_err(fail)?;

            Ok(Self { name, volume })
        }
    }

    fn fail(&self, e: windows::core::Error) -> VolumeError {
        VolumeError::Endpoint {
            endpoint: self.name,
            reason: e.to_string(),
        }
    }
}

impl VolumeEndpoint for WasapiEndpoint {
    fn scalar(&self) -> Result<f32, VolumeError> {
        unsafe { self.volume.GetMasterVolumeLevelScalar() }.map_err(|e| self.fail(e))
    }

    fn set_scalar(&self, value: f32) -> Result<(), VolumeError> {
        unsafe {
            self.volume
                .SetMasterVolumeLevelScalar(value.clamp(0.0, 1.0), std::ptr::null())
        }
        .map_err(|e| self.fail(e))
    }
}
