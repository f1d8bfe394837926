//! MPU-9250 over I2C: ±2 g, ±250 °/s, 41 Hz DLPF, 200 Hz output rate.
//! The AK8963 magnetometer is reached through the I2C bypass.

use std::time::Duration;

use balancer_traits::{BoxError, Imu, ImuSample};
use rppal::i2c::I2c;

use crate::error::HwError;
use crate::util::wait_until_with_timeout;

const SMPLRT_DIV: u8 = 0x19;
const CONFIG: u8 = 0x1A;
const GYRO_CONFIG: u8 = 0x1B;
const ACCEL_CONFIG: u8 = 0x1C;
const ACCEL_CONFIG2: u8 = 0x1D;
const INT_PIN_CFG: u8 = 0x37;
const INT_STATUS: u8 = 0x3A;
const ACCEL_XOUT_H: u8 = 0x3B;
const PWR_MGMT_1: u8 = 0x6B;

const AK8963_ADDR: u16 = 0x0C;
const AK8963_ST1: u8 = 0x02;
const AK8963_HXL: u8 = 0x03;
const AK8963_CNTL1: u8 = 0x0A;

const ACCEL_LSB_PER_G: f32 = 16_384.0;
const GYRO_LSB_PER_DPS: f32 = 131.0;
/// Gravity on -Y with the robot upright and still.
const REST_ACCEL: [f32; 3] = [0.0, -1.0, 0.0];

const DATA_READY_TIMEOUT: Duration = Duration::from_millis(50);

pub struct Mpu9250 {
    i2c: I2c,
    address: u16,
    sample: ImuSample,
    accel_bias: [f32; 3],
    gyro_bias: [f32; 3],
    mag_offset: [f32; 3],
    calibration_samples: u32,
}

impl Mpu9250 {
    pub fn new(address: u16, calibration_samples: u32) -> Result<Self, HwError> {
        let i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
        let mut imu = Self {
            i2c,
            address,
            sample: ImuSample::default(),
            accel_bias: [0.0; 3],
            gyro_bias: [0.0; 3],
            mag_offset: [0.0; 3],
            calibration_samples: calibration_samples.max(1),
        };
        imu.configure()?;
        Ok(imu)
    }

    fn configure(&mut self) -> Result<(), HwError> {
        self.write_reg(PWR_MGMT_1, 0x00)?;
        std::thread::sleep(Duration::from_millis(100));
        self.write_reg(PWR_MGMT_1, 0x01)?;
        self.write_reg(CONFIG, 0x03)?;
        self.write_reg(SMPLRT_DIV, 0x04)?;
        self.write_reg(GYRO_CONFIG, 0x00)?;
        self.write_reg(ACCEL_CONFIG, 0x00)?;
        self.write_reg(ACCEL_CONFIG2, 0x03)?;
        self.write_reg(INT_PIN_CFG, 0x02)?;
        tracing::info!(address = self.address, "mpu9250 configured");
        Ok(())
    }

    fn select(&mut self, address: u16) -> Result<(), HwError> {
        self.i2c
            .set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), HwError> {
        self.select(self.address)?;
        self.i2c
            .write(&[reg, value])
            .map(|_| ())
            .map_err(|e| HwError::I2c(format!("write 0x{reg:02X}: {e}")))
    }

    fn read_regs(&mut self, address: u16, reg: u8, buf: &mut [u8]) -> Result<(), HwError> {
        self.select(address)?;
        self.i2c
            .write_read(&[reg], buf)
            .map_err(|e| HwError::I2c(format!("read 0x{reg:02X}: {e}")))
    }

    fn data_ready(&mut self) -> bool {
        let mut status = [0u8; 1];
        let address = self.address;
        self.read_regs(address, INT_STATUS, &mut status).is_ok() && status[0] & 0x01 != 0
    }

    fn read_raw(&mut self) -> Result<([f32; 3], [f32; 3]), HwError> {
        let mut buf = [0u8; 14];
        let address = self.address;
        self.read_regs(address, ACCEL_XOUT_H, &mut buf)?;
        let word = |i: usize| f32::from(i16::from_be_bytes([buf[i], buf[i + 1]]));
        let accel = [
            word(0) / ACCEL_LSB_PER_G,
            word(2) / ACCEL_LSB_PER_G,
            word(4) / ACCEL_LSB_PER_G,
        ];
        // bytes 6..8 are temperature
        let gyro = [
            word(8) / GYRO_LSB_PER_DPS,
            word(10) / GYRO_LSB_PER_DPS,
            word(12) / GYRO_LSB_PER_DPS,
        ];
        Ok((accel, gyro))
    }

    fn wait_and_read(&mut self) -> Result<([f32; 3], [f32; 3]), HwError> {
        wait_until_with_timeout(
            || self.data_ready(),
            DATA_READY_TIMEOUT,
            Duration::from_micros(500),
        )?;
        self.read_raw()
    }

    fn read_mag(&mut self) -> Result<Option<[f32; 3]>, HwError> {
        let mut st1 = [0u8; 1];
        self.read_regs(AK8963_ADDR, AK8963_ST1, &mut st1)?;
        if st1[0] & 0x01 == 0 {
            return Ok(None);
        }
        // six data bytes plus ST2, which must be read to release the latch
        let mut buf = [0u8; 7];
        self.read_regs(AK8963_ADDR, AK8963_HXL, &mut buf)?;
        if buf[6] & 0x08 != 0 {
            return Ok(None);
        }
        let word = |i: usize| f32::from(i16::from_le_bytes([buf[i], buf[i + 1]]));
        Ok(Some([word(0), word(2), word(4)]))
    }
}

impl Imu for Mpu9250 {
    fn update(&mut self) -> Result<bool, BoxError> {
        if !self.data_ready() {
            return Ok(false);
        }
        let (accel, gyro) = self.read_raw()?;
        for i in 0..3 {
            self.sample.accel[i] = accel[i] - self.accel_bias[i];
            self.sample.gyro_dps[i] = gyro[i] - self.gyro_bias[i];
        }
        Ok(true)
    }

    fn sample(&self) -> ImuSample {
        self.sample
    }

    fn calibrate_accel_gyro(&mut self) -> Result<(), BoxError> {
        let n = self.calibration_samples;
        let mut accel_sum = [0.0f32; 3];
        let mut gyro_sum = [0.0f32; 3];
        for _ in 0..n {
            let (accel, gyro) = self.wait_and_read()?;
            for i in 0..3 {
                accel_sum[i] += accel[i];
                gyro_sum[i] += gyro[i];
            }
        }
        let n = n as f32;
        for i in 0..3 {
            self.accel_bias[i] = accel_sum[i] / n - REST_ACCEL[i];
            self.gyro_bias[i] = gyro_sum[i] / n;
        }
        tracing::info!(accel_bias = ?self.accel_bias, gyro_bias = ?self.gyro_bias, "accel/gyro calibrated");
        Ok(())
    }

    fn calibrate_mag(&mut self) -> Result<(), BoxError> {
        self.select(AK8963_ADDR)?;
        self.i2c
            .write(&[AK8963_CNTL1, 0x16])
            .map_err(|e| HwError::I2c(e.to_string()))?;
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut taken = 0;
        // 100 Hz continuous mode; sample while the user turns the robot.
        for _ in 0..self.calibration_samples * 10 {
            std::thread::sleep(Duration::from_millis(10));
            if let Some(m) = self.read_mag()? {
                for i in 0..3 {
                    min[i] = min[i].min(m[i]);
                    max[i] = max[i].max(m[i]);
                }
                taken += 1;
            }
        }
        if taken == 0 {
            return Err(HwError::Calibration("magnetometer produced no samples".into()).into());
        }
        for i in 0..3 {
            self.mag_offset[i] = (max[i] + min[i]) / 2.0;
        }
        tracing::info!(mag_offset = ?self.mag_offset, samples = taken, "magnetometer calibrated");
        Ok(())
    }
}
